use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use url::Url;

use super::{
    ArtifactId, BlobStore, MetadataStore, NewArtifactRecord, StoreError, StoredArtifactRecord,
};

const MEMORY_BASE: &str = "memory://blobs/";

#[derive(Debug, Default)]
struct State {
    blobs: HashMap<String, (Vec<u8>, String)>,
    records: Vec<StoredArtifactRecord>,
    next_id: u64,
    fail_next_put: Option<String>,
    fail_next_insert: Option<String>,
    fail_next_public_url: Option<String>,
    fail_lookups: Option<String>,
}

/// In-process blob and metadata store.
///
/// Blob addresses use the `memory://blobs/<key>` scheme. One-shot failures can
/// be armed to exercise the error paths of callers.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Poisoning only happens if a test panicked mid-update; the state is
    /// still consistent, so keep using it.
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn fail_next_put(&self, message: impl Into<String>) {
        self.state().fail_next_put = Some(message.into());
    }

    pub fn fail_next_insert(&self, message: impl Into<String>) {
        self.state().fail_next_insert = Some(message.into());
    }

    pub fn fail_next_public_url(&self, message: impl Into<String>) {
        self.state().fail_next_public_url = Some(message.into());
    }

    /// Fails every `latest`/`find` call until cleared with `None`.
    pub fn fail_lookups(&self, message: Option<String>) {
        self.state().fail_lookups = message;
    }

    pub fn record_count(&self) -> usize {
        self.state().records.len()
    }

    pub fn blob_count(&self) -> usize {
        self.state().blobs.len()
    }

    pub fn blob(&self, key: &str) -> Option<Vec<u8>> {
        self.state().blobs.get(key).map(|(bytes, _)| bytes.clone())
    }

    pub fn blob_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.state().blobs.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn records(&self) -> Vec<StoredArtifactRecord> {
        self.state().records.clone()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StoreError> {
        let mut state = self.state();
        if let Some(message) = state.fail_next_put.take() {
            return Err(StoreError::Unavailable(message));
        }
        if state.blobs.contains_key(key) {
            return Err(StoreError::api(None, format!("object '{key}' already exists")));
        }
        state
            .blobs
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, key: &str) -> Result<Url, StoreError> {
        if let Some(message) = self.state().fail_next_public_url.take() {
            return Err(StoreError::Unavailable(message));
        }
        Ok(Url::parse(MEMORY_BASE)?.join(key)?)
    }

    async fn fetch(&self, address: &Url) -> Result<Vec<u8>, StoreError> {
        let key = address
            .as_str()
            .strip_prefix(MEMORY_BASE)
            .ok_or_else(|| StoreError::NotFound(address.to_string()))?;
        self.blob(key)
            .ok_or_else(|| StoreError::NotFound(address.to_string()))
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn insert(&self, record: NewArtifactRecord) -> Result<StoredArtifactRecord, StoreError> {
        let mut state = self.state();
        if let Some(message) = state.fail_next_insert.take() {
            return Err(StoreError::Unavailable(message));
        }
        state.next_id += 1;
        let stored = StoredArtifactRecord {
            id: ArtifactId::new(state.next_id.to_string()),
            blob_address: record.blob_address,
            owner_id: record.owner_id,
            created_at: record.created_at,
        };
        state.records.push(stored.clone());
        Ok(stored)
    }

    async fn latest(
        &self,
        owner: Option<&str>,
    ) -> Result<Option<StoredArtifactRecord>, StoreError> {
        let state = self.state();
        if let Some(message) = &state.fail_lookups {
            return Err(StoreError::Unavailable(message.clone()));
        }
        // Later inserts win ties on created_at.
        Ok(state
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| owner.map_or(true, |o| r.owner_id.as_deref() == Some(o)))
            .max_by_key(|(index, r)| (r.created_at, *index))
            .map(|(_, r)| r.clone()))
    }

    async fn find(&self, id: &ArtifactId) -> Result<Option<StoredArtifactRecord>, StoreError> {
        let state = self.state();
        if let Some(message) = &state.fail_lookups {
            return Err(StoreError::Unavailable(message.clone()));
        }
        Ok(state.records.iter().find(|r| &r.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(store: &MemoryStore, key: &str, owner: Option<&str>) -> NewArtifactRecord {
        NewArtifactRecord {
            blob_address: store.public_url(key).unwrap(),
            owner_id: owner.map(str::to_string),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn put_then_fetch_round_trips() {
        let store = MemoryStore::new();
        store
            .put("screenshots/1.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        let address = store.public_url("screenshots/1.png").unwrap();
        assert_eq!(address.as_str(), "memory://blobs/screenshots/1.png");
        assert_eq!(store.fetch(&address).await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn put_never_overwrites() {
        let store = MemoryStore::new();
        store.put("a.png", vec![1], "image/png").await.unwrap();
        let err = store.put("a.png", vec![2], "image/png").await.unwrap_err();
        assert!(matches!(err, StoreError::Api { .. }));
        assert_eq!(store.blob("a.png"), Some(vec![1]));
    }

    #[tokio::test]
    async fn latest_is_scoped_by_owner() {
        let store = MemoryStore::new();
        let mut first = record(&store, "a.png", Some("u1"));
        first.created_at = Utc::now() - Duration::seconds(10);
        store.insert(first).await.unwrap();
        let second = store.insert(record(&store, "b.png", Some("u2"))).await.unwrap();

        let latest_any = store.latest(None).await.unwrap().unwrap();
        assert_eq!(latest_any.id, second.id);
        let latest_u1 = store.latest(Some("u1")).await.unwrap().unwrap();
        assert_eq!(latest_u1.owner_id.as_deref(), Some("u1"));
        assert!(store.latest(Some("nobody")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn armed_failures_fire_once() {
        let store = MemoryStore::new();
        store.fail_next_insert("db down");
        assert!(store.insert(record(&store, "a.png", None)).await.is_err());
        assert!(store.insert(record(&store, "a.png", None)).await.is_ok());
        assert_eq!(store.record_count(), 1);
    }
}
