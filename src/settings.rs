use std::path::{Path, PathBuf};

use snapshare_lib::{CaptureOptions, Config, SnapshareError};

use crate::cli::SurfaceArgs;

/// Tracks which CLI flags were explicitly provided vs. defaulted.
#[derive(Debug, Default)]
pub struct CaptureFlagSources {
    pub quality: bool,
    pub pixel_ratio: bool,
}

impl CaptureFlagSources {
    pub fn from_args(args: &[String]) -> Self {
        Self {
            quality: flag_present(args, "--quality"),
            pixel_ratio: flag_present(args, "--pixel-ratio"),
        }
    }
}

/// Checks if a flag was present in the command-line arguments.
pub fn flag_present(args: &[String], flag: &str) -> bool {
    args.iter()
        .any(|arg| arg == flag || arg.starts_with(&format!("{flag}=")))
}

/// Merge CLI arguments with config file, preferring CLI when flags are present.
pub fn resolve_capture_options(
    cli: &SurfaceArgs,
    config: &Config,
    flags: &CaptureFlagSources,
) -> CaptureOptions {
    let base = config.capture_options();
    CaptureOptions {
        exclude_external_stylesheets: if cli.keep_stylesheets {
            false
        } else {
            base.exclude_external_stylesheets
        },
        force_font_family: cli.font.clone().or(base.force_font_family),
        quality: if flags.quality {
            cli.quality
        } else {
            base.quality
        },
        pixel_ratio: if flags.pixel_ratio {
            cli.pixel_ratio
        } else {
            base.pixel_ratio
        },
        background: base.background,
    }
}

/// Download directory: `--out-dir` wins over `[download] directory`.
pub fn resolve_download_dir(cli_out_dir: Option<PathBuf>, config: &Config) -> PathBuf {
    cli_out_dir.unwrap_or_else(|| config.download.directory.clone())
}

/// Load config from a TOML file, central config, or return defaults.
/// Priority: explicit path > ~/.config/snapshare/config.toml > defaults
pub fn load_config(path: Option<&Path>) -> Result<Config, SnapshareError> {
    let cfg = Config::load(path).map_err(|e| {
        let loc = path
            .map(|p| p.display().to_string())
            .or_else(|| Config::central_config_path().map(|p| p.display().to_string()))
            .unwrap_or_else(|| "defaults".to_string());
        SnapshareError::Config(format!("Failed to read config {}: {}", loc, e))
    })?;

    cfg.validate().map_err(|e| {
        let prefix = path
            .map(|p| format!("Invalid config ({}): {}", p.display(), e))
            .unwrap_or_else(|| format!("Invalid config: {}", e));
        SnapshareError::Config(prefix)
    })?;
    Ok(cfg)
}

/// Format effective config as a single-line string.
pub fn format_effective_config(
    options: &CaptureOptions,
    config: &Config,
    config_source: Option<&Path>,
) -> String {
    let source = config_source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".to_string());
    let url_or_unset = |url: Option<&url::Url>| {
        url.map(|u| u.to_string())
            .unwrap_or_else(|| "unset".to_string())
    };
    format!(
        "Effective config [{source}]: quality={:.2}, pixel_ratio={:.2}, stylesheets={}, font={}, resource_timeout={}ms, storage={} (bucket {}, table {}, prefix {}), share_base={}, download_dir={}",
        options.quality,
        options.pixel_ratio,
        if options.exclude_external_stylesheets {
            "excluded"
        } else {
            "inlined"
        },
        options.force_font_family.as_deref().unwrap_or("surface"),
        config.capture.resource_timeout.as_millis(),
        url_or_unset(config.storage.url.as_ref()),
        config.storage.bucket,
        config.storage.table,
        config.storage.key_prefix,
        url_or_unset(config.share.base_url.as_ref()),
        config.download.directory.display(),
    )
}
