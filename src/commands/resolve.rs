use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use snapshare_lib::{
    ArtifactId, CaptureEngine, ResolveOutput, ShareLink, SnapshareError, SnapshotOutput,
    SNAPSHARE_OUTPUT_VERSION,
};
use url::Url;

use crate::cli::ReportArgs;
use crate::commands::common::{link_resolver, supabase_client};
use crate::formatting::{render_error, write_output};
use crate::settings::load_config;

/// Run the resolve command.
pub async fn run_resolve(
    config_path: Option<PathBuf>,
    verbose: bool,
    target: String,
    save: Option<PathBuf>,
    report: ReportArgs,
) -> ExitCode {
    let body = match resolve(config_path, verbose, &target, save).await {
        Ok(body) => body,
        Err(err) => return render_error(err, report.format, report.output),
    };
    if let Err(err) = write_output(&body, report.format, report.output.clone()) {
        return render_error(SnapshareError::Config(err.to_string()), report.format, report.output);
    }
    ExitCode::SUCCESS
}

/// Accepts a bare id or a `.../screenshot/<id>` link.
fn parse_target(target: &str) -> Result<(ArtifactId, Option<Url>), SnapshareError> {
    let trimmed = target.trim();
    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            let id = ShareLink::id_from_url(&url).ok_or_else(|| {
                SnapshareError::Config(format!("'{trimmed}' is not a share link (…/screenshot/<id>)"))
            })?;
            Ok((id, Some(url)))
        }
        _ if trimmed.is_empty() || trimmed.contains('/') => Err(SnapshareError::Config(format!(
            "'{trimmed}' is neither an artifact id nor a share link"
        ))),
        _ => Ok((ArtifactId::new(trimmed), None)),
    }
}

async fn resolve(
    config_path: Option<PathBuf>,
    verbose: bool,
    target: &str,
    save: Option<PathBuf>,
) -> Result<SnapshotOutput, SnapshareError> {
    let config = load_config(config_path.as_deref())?;
    let (id, link) = parse_target(target)?;
    if verbose {
        eprintln!("Resolving artifact {id}\u{2026}");
    }

    // Links carry their own base; bare ids only need one to satisfy the resolver.
    let base_url = match (&config.share.base_url, &link) {
        (Some(base), _) => base.clone(),
        (None, Some(link)) => link.join("/").map_err(|e| SnapshareError::Config(e.to_string()))?,
        (None, None) => Url::parse("http://localhost/").map_err(|e| SnapshareError::Config(e.to_string()))?,
    };
    let client = Arc::new(supabase_client(&config)?);
    let engine = CaptureEngine::new(config.capture.resource_timeout)?;
    let resolver = link_resolver(engine, client, base_url)?;

    let record = resolver.resolve_share_link(&id).await?;
    let (saved_path, saved_bytes) = match save {
        Some(path) => {
            let bytes = resolver.fetch_artifact_bytes(&id).await?;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, &bytes).await?;
            (Some(path), Some(bytes.len()))
        }
        None => (None, None),
    };

    Ok(SnapshotOutput::Resolve(ResolveOutput {
        version: SNAPSHARE_OUTPUT_VERSION.to_string(),
        id: record.id,
        blob_address: record.blob_address,
        owner_id: record.owner_id,
        created_at: record.created_at,
        saved_path,
        saved_bytes,
    }))
}
