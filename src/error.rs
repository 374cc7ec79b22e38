use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capture::{CaptureError, ResourceError};
use crate::clipboard::ClipboardError;
use crate::config::ConfigError;
use crate::link::LinkError;
use crate::persistence::PersistenceError;
use crate::share::ShareError;
use crate::storage::StoreError;
use crate::surface::{SurfaceLoadError, SurfaceSizeParseError};

#[derive(Debug, Error)]
pub enum SnapshareError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Surface error: {0}")]
    Surface(#[from] SurfaceLoadError),

    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    #[error("Clipboard error: {0}")]
    Clipboard(#[from] ClipboardError),

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistenceError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Link error: {0}")]
    Link(#[from] LinkError),

    #[error("Share error: {0}")]
    Share(#[from] ShareError),
}

impl From<ConfigError> for SnapshareError {
    fn from(err: ConfigError) -> Self {
        SnapshareError::Config(err.to_string())
    }
}

impl From<SurfaceSizeParseError> for SnapshareError {
    fn from(err: SurfaceSizeParseError) -> Self {
        SnapshareError::Config(format!("Invalid surface size: {err}"))
    }
}

impl SnapshareError {
    /// One-line message suitable for a user-facing notification.
    pub fn notification(&self) -> String {
        match self {
            SnapshareError::Capture(CaptureError::SurfaceDetached) => {
                "Nothing to capture: the preview is no longer on screen.".to_string()
            }
            SnapshareError::Capture(_) | SnapshareError::Resource(_) => {
                "Failed to capture screenshot.".to_string()
            }
            SnapshareError::Clipboard(_) => "Failed to copy screenshot to clipboard.".to_string(),
            SnapshareError::Persist(_) | SnapshareError::Link(LinkError::Persist(_)) => {
                "Failed to save screenshot.".to_string()
            }
            SnapshareError::Link(LinkError::NotFound(_)) => "Screenshot not found.".to_string(),
            SnapshareError::Link(_) | SnapshareError::Share(_) => {
                "Failed to share screenshot.".to_string()
            }
            SnapshareError::Store(_) => "Failed to reach screenshot storage.".to_string(),
            SnapshareError::Config(_) | SnapshareError::Surface(_) | SnapshareError::Io(_) => {
                self.to_string()
            }
        }
    }

    pub fn to_payload(&self) -> ErrorPayload {
        match self {
            SnapshareError::Io(e) => ErrorPayload::new(
                ErrorCategory::Io,
                e.to_string(),
                "Check file paths/permissions.",
            ),
            SnapshareError::Config(msg) => {
                let lower = msg.to_ascii_lowercase();
                if lower.contains("supabase_url") || lower.contains("storage.url") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Set SUPABASE_URL or [storage] url in the config file.",
                    )
                } else if lower.contains("supabase_anon_key") || lower.contains("service_role") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Set SUPABASE_SERVICE_ROLE_KEY (or SUPABASE_ANON_KEY) before uploading.",
                    )
                } else if lower.contains("base_url") {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Set SNAPSHARE_BASE_URL or [share] base_url (e.g., https://app.example.com).",
                    )
                } else {
                    ErrorPayload::new(
                        ErrorCategory::Config,
                        msg.to_string(),
                        "Check flags/paths (e.g., --slot N=PATH) and the config file.",
                    )
                }
            }
            SnapshareError::Surface(e) => ErrorPayload::new(
                ErrorCategory::Config,
                e.to_string(),
                "Pass a surface file in JSON or YAML (.json, .yaml, .yml).",
            ),
            SnapshareError::Capture(e) => capture_payload(e),
            SnapshareError::Resource(e) => ErrorPayload::new(
                ErrorCategory::Io,
                e.to_string(),
                "Verify the slot image path/URL and that it is a readable image.",
            ),
            SnapshareError::Clipboard(e) => ErrorPayload::new(
                ErrorCategory::Clipboard,
                e.to_string(),
                "Clipboard image writes are unavailable here; try downloading instead (rerun with --fallback-download or use `capture`).",
            ),
            SnapshareError::Persist(e) => persistence_payload(e),
            SnapshareError::Store(e) => store_payload(e),
            SnapshareError::Link(e) => match e {
                LinkError::Capture(inner) => capture_payload(inner),
                LinkError::Persist(inner) => persistence_payload(inner),
                LinkError::Lookup(inner) => ErrorPayload::new(
                    ErrorCategory::Link,
                    e.to_string(),
                    store_payload(inner)
                        .remediation
                        .unwrap_or_else(|| "Retry once the metadata store is reachable.".into()),
                ),
                LinkError::NotFound(_) => ErrorPayload::new(
                    ErrorCategory::Link,
                    e.to_string(),
                    "Check the link/id; the screenshot may have been deleted.",
                ),
                LinkError::InvalidBaseUrl { .. } => ErrorPayload::new(
                    ErrorCategory::Config,
                    e.to_string(),
                    "Set SNAPSHARE_BASE_URL or [share] base_url to an http(s) URL.",
                ),
            },
            SnapshareError::Share(e) => ErrorPayload::new(
                ErrorCategory::Share,
                e.to_string(),
                "Copy the link manually from the JSON output, or configure [share] command.",
            ),
        }
    }
}

fn capture_payload(err: &CaptureError) -> ErrorPayload {
    let remediation = match err {
        CaptureError::SurfaceDetached => "Provide a surface with a root node.",
        CaptureError::CrossOriginStylesheet(_) => {
            "Drop --keep-stylesheets (external stylesheets are excluded by default)."
        }
        CaptureError::InvalidOptions(_) => "Use --quality between 0.0 and 1.0 and a positive pixel ratio.",
        CaptureError::Paint(_) | CaptureError::InvalidRaster(_) => {
            "Check the surface size; re-run with --verbose for details."
        }
        CaptureError::Setup(_) => "Re-run with --verbose; check proxy settings.",
    };
    ErrorPayload::new(ErrorCategory::Capture, err.to_string(), remediation)
}

fn persistence_payload(err: &PersistenceError) -> ErrorPayload {
    match err {
        PersistenceError::InvalidNaming(_) => ErrorPayload::new(
            ErrorCategory::Config,
            err.to_string(),
            "Use a non-empty key prefix and an owner id without '/'.",
        ),
        PersistenceError::Upload(inner) => ErrorPayload::new(
            ErrorCategory::Upload,
            err.to_string(),
            store_payload(&inner.source)
                .remediation
                .unwrap_or_else(|| "Check the storage bucket and retry.".into()),
        ),
        PersistenceError::Metadata(inner) => ErrorPayload::new(
            ErrorCategory::Metadata,
            err.to_string(),
            format!(
                "The image was stored at '{}' but not recorded; check the metadata table and retry.",
                inner.orphaned_key
            ),
        ),
    }
}

fn store_payload(err: &StoreError) -> ErrorPayload {
    let (category, remediation) = match err {
        StoreError::Network(_) => (
            ErrorCategory::Network,
            "Check connectivity/proxy/VPN and retry.",
        ),
        StoreError::Api {
            status: Some(401 | 403),
            ..
        } => (
            ErrorCategory::Config,
            "Check SUPABASE_SERVICE_ROLE_KEY/SUPABASE_ANON_KEY and bucket/table policies.",
        ),
        StoreError::Api { .. } | StoreError::Unavailable(_) => (
            ErrorCategory::Network,
            "Check the storage service status and retry after waiting.",
        ),
        StoreError::Serialization(_) => (
            ErrorCategory::Metadata,
            "Check the metadata table columns (id, url, user_id, created_at).",
        ),
        StoreError::InvalidUrl(_) => (
            ErrorCategory::Config,
            "Verify SUPABASE_URL (e.g., https://<project>.supabase.co).",
        ),
        StoreError::NotFound(_) => (
            ErrorCategory::Link,
            "The stored object is missing; regenerate the screenshot.",
        ),
    };
    ErrorPayload::new(category, err.to_string(), remediation)
}

pub type Result<T> = std::result::Result<T, SnapshareError>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Capture,
    Clipboard,
    Upload,
    Metadata,
    Link,
    Share,
    Network,
    Io,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub category: ErrorCategory,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl ErrorPayload {
    pub fn new(category: ErrorCategory, message: String, remediation: impl Into<String>) -> Self {
        Self {
            category,
            message,
            remediation: Some(remediation.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MetadataError;
    use crate::storage::ArtifactId;

    #[test]
    fn clipboard_payload_suggests_download() {
        let err = SnapshareError::from(ClipboardError::Unsupported);
        let payload = err.to_payload();
        assert_eq!(payload.category, ErrorCategory::Clipboard);
        let remediation = payload.remediation.unwrap_or_default();
        assert!(
            remediation.contains("download"),
            "expected download remediation, got: {remediation}"
        );
        assert_eq!(
            err.notification(),
            "Failed to copy screenshot to clipboard."
        );
    }

    #[test]
    fn metadata_payload_names_orphaned_key() {
        let err = SnapshareError::from(PersistenceError::from(MetadataError {
            orphaned_key: "screenshots/123.png".into(),
            blob_address: None,
            source: StoreError::Unavailable("db down".into()),
        }));
        let payload = err.to_payload();
        assert_eq!(payload.category, ErrorCategory::Metadata);
        assert!(payload
            .remediation
            .unwrap_or_default()
            .contains("screenshots/123.png"));
        assert_eq!(err.notification(), "Failed to save screenshot.");
    }

    #[test]
    fn link_capture_errors_keep_capture_category() {
        let err = SnapshareError::from(LinkError::from(CaptureError::SurfaceDetached));
        assert_eq!(err.to_payload().category, ErrorCategory::Capture);
    }

    #[test]
    fn not_found_link_is_link_category() {
        let err = SnapshareError::from(LinkError::NotFound(ArtifactId::new("9")));
        assert_eq!(err.to_payload().category, ErrorCategory::Link);
        assert_eq!(err.notification(), "Screenshot not found.");
    }

    #[test]
    fn auth_failures_point_at_keys() {
        let err = SnapshareError::from(StoreError::Api {
            status: Some(403),
            message: "new row violates row-level security policy".into(),
        });
        let payload = err.to_payload();
        assert_eq!(payload.category, ErrorCategory::Config);
        assert!(payload
            .remediation
            .unwrap_or_default()
            .contains("SUPABASE_SERVICE_ROLE_KEY"));
    }

    #[test]
    fn config_payload_uses_default_remediation_for_other_messages() {
        let err = SnapshareError::Config("Some other config issue".to_string());
        let remediation = err.to_payload().remediation.unwrap_or_default();
        assert!(remediation.contains("Check flags/paths"));
    }

    #[test]
    fn config_payload_mentions_supabase_url() {
        let err = SnapshareError::Config("SUPABASE_URL is not set".to_string());
        let remediation = err.to_payload().remediation.unwrap_or_default();
        assert!(remediation.contains("SUPABASE_URL"));
    }
}
