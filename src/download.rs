//! Local download of captured rasters.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::capture::RasterArtifact;

pub const DEFAULT_APP_NAME: &str = "strand-ai";

/// Which screen a capture came from, e.g. `Hair Attributes` for `male`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenKey {
    pub screen_type: String,
    pub gender: Option<String>,
}

impl ScreenKey {
    pub fn new(screen_type: impl Into<String>, gender: Option<String>) -> Self {
        Self {
            screen_type: screen_type.into(),
            gender,
        }
    }

    /// Lowercase alphanumeric words joined by `-`; `screen` when empty.
    /// Separators, dots and other punctuation never survive into the slug.
    pub fn slug(&self) -> String {
        let mut parts: Vec<String> = Vec::new();
        for piece in std::iter::once(self.screen_type.as_str()).chain(self.gender.as_deref()) {
            parts.extend(
                piece
                    .split(|c: char| !c.is_alphanumeric())
                    .filter(|word| !word.is_empty())
                    .map(|word| word.to_lowercase()),
            );
        }
        if parts.is_empty() {
            "screen".to_string()
        } else {
            parts.join("-")
        }
    }
}

impl fmt::Display for ScreenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slug())
    }
}

/// `<app>-<screen-key>-<millis>.png`
pub fn download_filename(app_name: &str, key: &ScreenKey, at: DateTime<Utc>) -> String {
    format!("{app_name}-{}-{}.png", key.slug(), at.timestamp_millis())
}

/// Writes the artifact to `dir/name`, creating `dir` if needed. `name` must be
/// a bare file name.
pub async fn save_download(
    artifact: &RasterArtifact,
    dir: &Path,
    name: &str,
) -> io::Result<PathBuf> {
    if Path::new(name).file_name() != Some(std::ffi::OsStr::new(name)) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("download name '{name}' is not a plain file name"),
        ));
    }
    if !dir.as_os_str().is_empty() {
        fs::create_dir_all(dir).await?;
    }
    let path = dir.join(name);
    fs::write(&path, artifact.bytes()).await?;
    log::info!("Saved {} ({} bytes)", path.display(), artifact.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{codecs::png::PngEncoder, ColorType, ImageEncoder};
    use tempfile::TempDir;

    #[test]
    fn slug_joins_screen_and_gender() {
        let key = ScreenKey::new("Hair  Attributes", Some("Male".into()));
        assert_eq!(key.slug(), "hair-attributes-male");
        assert_eq!(ScreenKey::new("Scalp", None).slug(), "scalp");
        assert_eq!(ScreenKey::default().slug(), "screen");
    }

    #[test]
    fn slug_never_carries_path_components() {
        let key = ScreenKey::new("../../etc/passwd", Some("a\\b".into()));
        assert_eq!(key.slug(), "etc-passwd-a-b");
        assert_eq!(ScreenKey::new("..", Some("/".into())).slug(), "screen");
    }

    #[test]
    fn filename_uses_epoch_millis() {
        let at = DateTime::parse_from_rfc3339("2024-01-01T00:00:00.250Z")
            .unwrap()
            .with_timezone(&Utc);
        let name = download_filename(DEFAULT_APP_NAME, &ScreenKey::new("Scalp", None), at);
        assert_eq!(name, "strand-ai-scalp-1704067200250.png");
    }

    #[tokio::test]
    async fn save_creates_directory_and_writes_bytes() {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(&[0, 0, 0, 255], 1, 1, ColorType::Rgba8)
            .unwrap();
        let artifact = RasterArtifact::from_png(bytes.clone()).unwrap();
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested/out");

        let path = save_download(&artifact, &target, "shot.png").await.unwrap();

        assert_eq!(path, target.join("shot.png"));
        assert_eq!(std::fs::read(path).unwrap(), bytes);
    }

    #[tokio::test]
    async fn hostile_screen_key_stays_inside_download_dir() {
        let mut bytes = Vec::new();
        PngEncoder::new(&mut bytes)
            .write_image(&[0, 0, 0, 255], 1, 1, ColorType::Rgba8)
            .unwrap();
        let artifact = RasterArtifact::from_png(bytes).unwrap();
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("out");

        let key = ScreenKey::new("../../escaped", None);
        let name = download_filename(DEFAULT_APP_NAME, &key, Utc::now());
        let path = save_download(&artifact, &out, &name).await.unwrap();
        assert_eq!(path.parent(), Some(out.as_path()));

        let err = save_download(&artifact, &out, "../escaped.png").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert!(!dir.path().join("escaped.png").exists());
    }
}
