//! Share-link resolution: reuse the latest persisted artifact or create one.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::capture::{CaptureEngine, CaptureError, CaptureOptions};
use crate::persistence::{NamingContext, PersistenceClient, PersistenceError};
use crate::storage::{ArtifactId, MetadataStore, StoreError, StoredArtifactRecord};
use crate::surface::Surface;

/// Path segment between the base URL and the artifact id.
pub const SHARE_ROUTE: &str = "screenshot";

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Looking up the latest artifact failed: {0}")]
    Lookup(#[source] StoreError),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Persist(#[from] PersistenceError),

    #[error("No artifact with id '{0}'")]
    NotFound(ArtifactId),

    #[error("Invalid share base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

/// Whether an existing artifact may satisfy a share request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
    /// Reuse the latest artifact in the owner's scope, even if the surface
    /// changed since it was captured.
    #[default]
    ReuseLatest,
    /// Always capture and persist a new artifact.
    Regenerate,
}

/// Everything needed to produce an artifact when none can be reused.
#[derive(Debug, Clone, Copy)]
pub struct ArtifactSource<'a> {
    pub surface: &'a Surface,
    pub options: &'a CaptureOptions,
    pub naming: &'a NamingContext,
    pub freshness: Freshness,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareLink {
    pub id: ArtifactId,
    pub url: Url,
}

impl ShareLink {
    /// `<base>/screenshot/<id>`; any path on the base is kept.
    pub fn new(base_url: &Url, id: ArtifactId) -> Result<Self, LinkError> {
        let mut url = base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        url.path_segments_mut()
            .map_err(|_| LinkError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "cannot be a base".into(),
            })?
            .pop_if_empty()
            .push(SHARE_ROUTE)
            .push(id.as_str());
        Ok(Self { id, url })
    }

    /// Inverse of [`ShareLink::new`]: the id in a `.../screenshot/<id>` link.
    pub fn id_from_url(url: &Url) -> Option<ArtifactId> {
        let segments: Vec<&str> = url.path_segments()?.collect();
        match segments.as_slice() {
            [.., route, id] if *route == SHARE_ROUTE && !id.is_empty() => {
                Some(ArtifactId::new(*id))
            }
            _ => None,
        }
    }
}

impl fmt::Display for ShareLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkState {
    Lookup,
    Creating,
}

#[derive(Clone)]
pub struct LinkResolver {
    engine: CaptureEngine,
    persistence: PersistenceClient,
    records: Arc<dyn MetadataStore>,
    base_url: Url,
}

impl LinkResolver {
    pub fn new(
        engine: CaptureEngine,
        persistence: PersistenceClient,
        records: Arc<dyn MetadataStore>,
        base_url: Url,
    ) -> Result<Self, LinkError> {
        if !matches!(base_url.scheme(), "http" | "https") || base_url.cannot_be_a_base() {
            return Err(LinkError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: "expected an http(s) URL".into(),
            });
        }
        Ok(Self {
            engine,
            persistence,
            records,
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn link_for(&self, id: ArtifactId) -> Result<ShareLink, LinkError> {
        ShareLink::new(&self.base_url, id)
    }

    /// Returns a link to the latest artifact in the naming context's owner
    /// scope, capturing and persisting one first if none exists (or if
    /// `Regenerate` was requested).
    ///
    /// A lookup failure is an error; it never silently falls back to creating
    /// a duplicate artifact.
    pub async fn get_or_create_share_link(
        &self,
        source: ArtifactSource<'_>,
    ) -> Result<ShareLink, LinkError> {
        let owner = source.naming.owner_id.as_deref();
        let mut state = match source.freshness {
            Freshness::ReuseLatest => LinkState::Lookup,
            Freshness::Regenerate => LinkState::Creating,
        };

        let record = loop {
            log::debug!("Share link state: {state:?}");
            state = match state {
                LinkState::Lookup => match self.records.latest(owner).await {
                    Ok(Some(record)) => break record,
                    Ok(None) => LinkState::Creating,
                    Err(err) => return Err(LinkError::Lookup(err)),
                },
                LinkState::Creating => {
                    let artifact = self.engine.capture(source.surface, source.options).await?;
                    break self.persistence.upload(artifact, source.naming).await?;
                }
            };
        };

        let link = self.link_for(record.id)?;
        log::info!("Resolved share link {link}");
        Ok(link)
    }

    /// Record behind `/screenshot/<id>`, or `NotFound`.
    pub async fn resolve_share_link(
        &self,
        id: &ArtifactId,
    ) -> Result<StoredArtifactRecord, LinkError> {
        match self.records.find(id).await {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(LinkError::NotFound(id.clone())),
            Err(err) => Err(LinkError::Lookup(err)),
        }
    }

    /// Stored raster bytes for `id`.
    pub async fn fetch_artifact_bytes(&self, id: &ArtifactId) -> Result<Vec<u8>, LinkError> {
        let record = self.resolve_share_link(id).await?;
        match self.persistence.blob_store().fetch(&record.blob_address).await {
            Ok(bytes) => Ok(bytes),
            Err(StoreError::NotFound(_)) => Err(LinkError::NotFound(id.clone())),
            Err(err) => Err(LinkError::Lookup(err)),
        }
    }
}
