use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::capture::{CaptureOptions, DEFAULT_RESOURCE_TIMEOUT};
use crate::download::DEFAULT_APP_NAME;
use crate::persistence::{NamingContext, DEFAULT_KEY_PREFIX};
use crate::share::{DEFAULT_SHARE_TEXT, DEFAULT_SHARE_TITLE};
use crate::storage::SupabaseTarget;

pub const SUPABASE_URL_ENV: &str = "SUPABASE_URL";
pub const BASE_URL_ENV: &str = "SNAPSHARE_BASE_URL";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub storage: StorageConfig,
    pub share: ShareConfig,
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub quality: f32,
    pub pixel_ratio: f32,
    pub exclude_external_stylesheets: bool,
    pub force_font_family: Option<String>,
    #[serde(with = "humantime_serde")]
    pub resource_timeout: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            quality: 1.0,
            pixel_ratio: 1.0,
            exclude_external_stylesheets: true,
            force_font_family: Some("Poppins".to_string()),
            resource_timeout: DEFAULT_RESOURCE_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub url: Option<Url>,
    pub bucket: String,
    pub table: String,
    pub key_prefix: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let target = SupabaseTarget::default();
        Self {
            url: None,
            bucket: target.bucket,
            table: target.table,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    pub base_url: Option<Url>,
    pub title: String,
    pub text: String,
    /// Program and arguments used as the native share facility.
    pub command: Option<Vec<String>>,
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            title: DEFAULT_SHARE_TITLE.to_string(),
            text: DEFAULT_SHARE_TEXT.to_string(),
            command: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    pub app_name: String,
    pub directory: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            app_name: DEFAULT_APP_NAME.to_string(),
            directory: PathBuf::from("."),
        }
    }
}

impl Config {
    /// `<config_dir>/snapshare/config.toml`
    pub fn central_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("snapshare").join("config.toml"))
    }

    /// Loads `path`, else the central config file if it exists, else defaults.
    /// Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let source = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::central_config_path().filter(|p| p.exists()),
        };

        let mut config = match source {
            Some(path) => {
                let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.display().to_string(),
                    source,
                })?;
                let config: Config = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.display().to_string(),
                    source,
                })?;
                log::debug!("Loaded config from {}", path.display());
                config
            }
            None => {
                log::debug!("No config file found, using defaults");
                Config::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Applies `SUPABASE_URL` and `SNAPSHARE_BASE_URL` from `lookup`.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let parse = |key: &str| -> Result<Option<Url>, ConfigError> {
            match lookup(key).filter(|v| !v.trim().is_empty()) {
                Some(raw) => Url::parse(raw.trim())
                    .map(Some)
                    .map_err(|e| ConfigError::Invalid(format!("{key}='{raw}' is not a URL: {e}"))),
                None => Ok(None),
            }
        };

        if let Some(url) = parse(SUPABASE_URL_ENV)? {
            self.storage.url = Some(url);
        }
        if let Some(url) = parse(BASE_URL_ENV)? {
            self.share.base_url = Some(url);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.capture.quality) {
            return Err(format!(
                "capture.quality must be between 0.0 and 1.0, got {}",
                self.capture.quality
            ));
        }
        if !self.capture.pixel_ratio.is_finite() || self.capture.pixel_ratio <= 0.0 {
            return Err(format!(
                "capture.pixel_ratio must be positive, got {}",
                self.capture.pixel_ratio
            ));
        }
        for (name, value) in [
            ("storage.bucket", &self.storage.bucket),
            ("storage.table", &self.storage.table),
            ("storage.key_prefix", &self.storage.key_prefix),
        ] {
            if value.trim_matches('/').trim().is_empty() {
                return Err(format!("{name} cannot be empty"));
            }
        }
        for (name, url) in [
            ("storage.url", &self.storage.url),
            ("share.base_url", &self.share.base_url),
        ] {
            if let Some(url) = url {
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(format!("{name} must be an http(s) URL, got {url}"));
                }
            }
        }
        if matches!(&self.share.command, Some(argv) if argv.is_empty()) {
            return Err("share.command cannot be an empty list".to_string());
        }
        Ok(())
    }

    pub fn capture_options(&self) -> CaptureOptions {
        CaptureOptions {
            exclude_external_stylesheets: self.capture.exclude_external_stylesheets,
            force_font_family: self.capture.force_font_family.clone(),
            quality: self.capture.quality,
            pixel_ratio: self.capture.pixel_ratio,
            background: None,
        }
    }

    pub fn naming(&self, owner_id: Option<String>) -> NamingContext {
        NamingContext {
            owner_id,
            key_prefix: self.storage.key_prefix.clone(),
        }
    }

    pub fn supabase_target(&self) -> SupabaseTarget {
        SupabaseTarget {
            bucket: self.storage.bucket.clone(),
            table: self.storage.table.clone(),
        }
    }
}
