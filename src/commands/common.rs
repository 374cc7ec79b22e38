use std::path::Path;
use std::sync::Arc;

use snapshare_lib::capture::resources::slot_source;
use snapshare_lib::{
    CaptureEngine, CaptureOptions, Config, LinkResolver, PersistenceClient, RasterArtifact,
    RasterDescriptor, SnapshareError, SupabaseAuth, SupabaseClient, Surface,
};
use url::Url;

use crate::cli::SurfaceArgs;
use crate::settings::{
    format_effective_config, load_config, resolve_capture_options, CaptureFlagSources,
};

/// Config, options and surface resolved for a capturing command.
pub struct Prepared {
    pub config: Config,
    pub options: CaptureOptions,
    pub surface: Surface,
    pub engine: CaptureEngine,
}

pub async fn prepare_capture(
    raw_args: &[String],
    config_path: Option<&Path>,
    verbose: bool,
    args: &SurfaceArgs,
) -> Result<Prepared, SnapshareError> {
    let config = load_config(config_path)?;
    let options = resolve_capture_options(args, &config, &CaptureFlagSources::from_args(raw_args));
    if verbose {
        eprintln!("{}", format_effective_config(&options, &config, config_path));
        eprintln!("Loading surface {}\u{2026}", args.surface.display());
    }

    let surface = load_surface(args).await?;
    let engine = CaptureEngine::new(config.capture.resource_timeout)?;
    Ok(Prepared {
        config,
        options,
        surface,
        engine,
    })
}

/// Loads the surface file, applies `--size` and fills `--slot` images.
pub async fn load_surface(args: &SurfaceArgs) -> Result<Surface, SnapshareError> {
    let mut surface = Surface::load(&args.surface)?;
    if let Some(size) = args.size {
        surface.size = size;
    }
    for slot in &args.slots {
        let src = slot_source(&slot.source).await?;
        if !surface.fill_slot(slot.index, src) {
            return Err(SnapshareError::Config(format!(
                "Surface {} has no image slot {}",
                args.surface.display(),
                slot.index
            )));
        }
        log::debug!("Filled slot {} from {}", slot.index, slot.source);
    }
    Ok(surface)
}

pub fn supabase_client(config: &Config) -> Result<SupabaseClient, SnapshareError> {
    let url = config.storage.url.as_ref().ok_or_else(|| {
        SnapshareError::Config(
            "Storage URL is not set; export SUPABASE_URL or set [storage] url".to_string(),
        )
    })?;
    let auth = SupabaseAuth::from_env().ok_or_else(|| {
        SnapshareError::Config(
            "SUPABASE_SERVICE_ROLE_KEY or SUPABASE_ANON_KEY environment variable is required"
                .to_string(),
        )
    })?;
    Ok(SupabaseClient::with_timeout(
        auth,
        url.as_str(),
        config.supabase_target(),
        config.storage.timeout,
    )?)
}

pub fn share_base_url(config: &Config) -> Result<Url, SnapshareError> {
    config.share.base_url.clone().ok_or_else(|| {
        SnapshareError::Config(
            "Share base_url is not set; export SNAPSHARE_BASE_URL or set [share] base_url"
                .to_string(),
        )
    })
}

pub fn link_resolver(
    engine: CaptureEngine,
    client: Arc<SupabaseClient>,
    base_url: Url,
) -> Result<LinkResolver, SnapshareError> {
    let persistence = PersistenceClient::new(client.clone(), client.clone());
    Ok(LinkResolver::new(engine, persistence, client, base_url)?)
}

pub fn raster_descriptor(artifact: &RasterArtifact) -> RasterDescriptor {
    RasterDescriptor {
        width: artifact.width(),
        height: artifact.height(),
        bytes: artifact.len(),
        mime_type: artifact.mime_type().to_string(),
    }
}
