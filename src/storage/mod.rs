//! Blob and metadata store seams.
//!
//! [`BlobStore`] holds raster bytes under caller-chosen keys; [`MetadataStore`]
//! holds one row per persisted artifact. Both are injected into the
//! persistence client and link resolver as trait objects.

mod memory;
mod supabase;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use url::Url;

pub use memory::MemoryStore;
pub use supabase::{SupabaseAuth, SupabaseClient, SupabaseTarget};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Store API error{}: {message}", status_suffix(.status))]
    Api { status: Option<u16>, message: String },

    #[error("Unexpected store response: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl StoreError {
    pub fn api(status: Option<reqwest::StatusCode>, message: impl Into<String>) -> Self {
        Self::Api {
            status: status.map(|s| s.as_u16()),
            message: message.into(),
        }
    }
}

/// Identifier assigned by the metadata store. Rows keyed by integer or text
/// identity columns both deserialize into it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Serialize for ArtifactId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for ArtifactId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Int(id) => ArtifactId(id.to_string()),
            Raw::Text(id) => ArtifactId(id),
        })
    }
}

/// Row written after a successful blob put.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewArtifactRecord {
    #[serde(rename = "url")]
    pub blob_address: Url,
    #[serde(rename = "user_id", skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifactRecord {
    pub id: ArtifactId,
    #[serde(rename = "url")]
    pub blob_address: Url,
    #[serde(rename = "user_id", default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Stores `bytes` under `key`. Existing keys are never overwritten.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError>;

    /// Publicly fetchable address of `key`.
    fn public_url(&self, key: &str) -> Result<Url, StoreError>;

    async fn fetch(&self, address: &Url) -> Result<Vec<u8>, StoreError>;
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    async fn insert(&self, record: NewArtifactRecord) -> Result<StoredArtifactRecord, StoreError>;

    /// Most recently created record, restricted to `owner` when given.
    async fn latest(&self, owner: Option<&str>)
        -> Result<Option<StoredArtifactRecord>, StoreError>;

    async fn find(&self, id: &ArtifactId) -> Result<Option<StoredArtifactRecord>, StoreError>;
}
