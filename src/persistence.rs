//! Uploads rasters to the blob store and records them in the metadata store.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use url::Url;

use crate::capture::RasterArtifact;
use crate::storage::{BlobStore, MetadataStore, NewArtifactRecord, StoreError, StoredArtifactRecord};

pub const DEFAULT_KEY_PREFIX: &str = "screenshots";

/// Blob put failed; no metadata row was written.
#[derive(Debug, Error)]
#[error("Upload of '{key}' failed: {source}")]
pub struct UploadError {
    pub key: String,
    #[source]
    pub source: StoreError,
}

/// Blob exists but its metadata row does not. The blob at `orphaned_key` is
/// unreferenced.
#[derive(Debug, Error)]
#[error("Metadata insert for '{orphaned_key}' failed: {source}")]
pub struct MetadataError {
    pub orphaned_key: String,
    pub blob_address: Option<Url>,
    #[source]
    pub source: StoreError,
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Invalid naming context: {0}")]
    InvalidNaming(String),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// Owner and key prefix used to name an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingContext {
    pub owner_id: Option<String>,
    pub key_prefix: String,
}

impl Default for NamingContext {
    fn default() -> Self {
        Self {
            owner_id: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl NamingContext {
    pub fn for_owner(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Self::default()
        }
    }

    /// `<prefix>/<micros>.png`, or `<prefix>/<owner>-<micros>.png` with an owner.
    pub fn object_key(&self, micros: u64) -> Result<String, PersistenceError> {
        let prefix = self.key_prefix.trim_matches('/');
        if prefix.is_empty() {
            return Err(PersistenceError::InvalidNaming(
                "key prefix cannot be empty".into(),
            ));
        }

        match self.owner_id.as_deref() {
            None => Ok(format!("{prefix}/{micros}.png")),
            Some(owner) if owner.is_empty() || owner.contains('/') => {
                Err(PersistenceError::InvalidNaming(format!(
                    "owner id '{owner}' must be non-empty and contain no '/'"
                )))
            }
            Some(owner) => Ok(format!("{prefix}/{owner}-{micros}.png")),
        }
    }
}

static LAST_KEY_MICROS: AtomicU64 = AtomicU64::new(0);

/// Microseconds since the epoch, strictly increasing within the process so two
/// uploads never derive the same key.
fn unique_micros() -> u64 {
    let now = u64::try_from(Utc::now().timestamp_micros()).unwrap_or(0);
    let mut last = LAST_KEY_MICROS.load(Ordering::Relaxed);
    loop {
        let next = now.max(last + 1);
        match LAST_KEY_MICROS.compare_exchange_weak(last, next, Ordering::SeqCst, Ordering::Relaxed)
        {
            Ok(_) => return next,
            Err(current) => last = current,
        }
    }
}

#[derive(Clone)]
pub struct PersistenceClient {
    blobs: Arc<dyn BlobStore>,
    records: Arc<dyn MetadataStore>,
}

impl PersistenceClient {
    pub fn new(blobs: Arc<dyn BlobStore>, records: Arc<dyn MetadataStore>) -> Self {
        Self { blobs, records }
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Stores the artifact and writes exactly one metadata row for it.
    ///
    /// The row is inserted only after the blob put succeeds. If the insert
    /// then fails, the blob stays in the store and the error names its key.
    pub async fn upload(
        &self,
        artifact: RasterArtifact,
        naming: &NamingContext,
    ) -> Result<StoredArtifactRecord, PersistenceError> {
        let key = naming.object_key(unique_micros())?;
        let created_at = artifact.created_at();
        let mime_type = artifact.mime_type();
        let size = artifact.len();

        log::debug!("Uploading artifact as '{key}' ({size} bytes)");
        self.blobs
            .put(&key, artifact.into_bytes(), mime_type)
            .await
            .map_err(|source| UploadError {
                key: key.clone(),
                source,
            })?;

        let blob_address = match self.blobs.public_url(&key) {
            Ok(address) => address,
            Err(source) => {
                return Err(orphaned(key, None, source).into());
            }
        };

        let record = NewArtifactRecord {
            blob_address: blob_address.clone(),
            owner_id: naming.owner_id.clone(),
            created_at,
        };
        match self.records.insert(record).await {
            Ok(stored) => {
                log::info!("Persisted artifact {} at {}", stored.id, stored.blob_address);
                Ok(stored)
            }
            Err(source) => Err(orphaned(key, Some(blob_address), source).into()),
        }
    }
}

fn orphaned(key: String, blob_address: Option<Url>, source: StoreError) -> MetadataError {
    log::error!("Blob '{key}' stored without a metadata record: {source}");
    MetadataError {
        orphaned_key: key,
        blob_address,
        source,
    }
}
