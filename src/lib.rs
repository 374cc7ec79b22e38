//! Snapshare Library
//!
//! Captures a rendered mockup surface into a PNG, then copies, downloads,
//! persists or shares it.
//!
//! # Module Overview
//!
//! - [`surface`] - The laid-out composition handed over for capture
//! - [`capture`] - Raster capture engine and resource loading
//! - [`clipboard`] - System clipboard adapter
//! - [`download`] - Local download naming and saving
//! - [`storage`] - Blob/metadata store seams (Supabase, in-memory)
//! - [`persistence`] - Upload + metadata record
//! - [`link`] - Get-or-create share links and link resolution
//! - [`share`] - Native share with clipboard fallback
//! - [`config`] - Configuration file support
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use snapshare_lib::{CaptureEngine, CaptureOptions, MemoryStore, NamingContext, PersistenceClient, Surface};
//!
//! # async fn example() -> snapshare_lib::Result<()> {
//! let surface = Surface::load(std::path::Path::new("preview.json"))?;
//! let engine = CaptureEngine::new(Duration::from_secs(10))?;
//! let artifact = engine.capture(&surface, &CaptureOptions::default()).await?;
//!
//! let store = Arc::new(MemoryStore::new());
//! let persistence = PersistenceClient::new(store.clone(), store);
//! let record = persistence.upload(artifact, &NamingContext::default()).await?;
//! println!("stored {} at {}", record.id, record.blob_address);
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod clipboard;
pub mod config;
pub mod download;
pub mod error;
pub mod link;
pub mod output;
pub mod persistence;
pub mod share;
pub mod storage;
pub mod surface;

pub use capture::{CaptureEngine, CaptureError, CaptureOptions, RasterArtifact, PNG_MIME};
pub use clipboard::{copy_to_clipboard, ClipboardBackend, ClipboardError, SystemClipboard};
pub use config::Config;
pub use download::{download_filename, save_download, ScreenKey};
pub use error::{ErrorCategory, ErrorPayload, Result, SnapshareError};
pub use link::{ArtifactSource, Freshness, LinkError, LinkResolver, ShareLink};
pub use output::{
    CaptureOutput, CopyOutput, ErrorOutput, RasterDescriptor, ResolveOutput, ShareOutput,
    SnapshotOutput, UploadOutput, SNAPSHARE_OUTPUT_VERSION,
};
pub use persistence::{NamingContext, PersistenceClient, PersistenceError};
pub use share::{CommandShare, NativeShare, ShareDispatcher, ShareError, ShareOutcome};
pub use storage::{
    ArtifactId, BlobStore, MemoryStore, MetadataStore, StoreError, StoredArtifactRecord,
    SupabaseAuth, SupabaseClient,
};
pub use surface::{Surface, SurfaceBuilder, SurfaceSize};
