use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use snapshare_lib::{
    PersistenceClient, ShareLink, SnapshareError, SnapshotOutput, UploadOutput,
    SNAPSHARE_OUTPUT_VERSION,
};

use crate::cli::{ReportArgs, SurfaceArgs};
use crate::commands::common::{prepare_capture, supabase_client};
use crate::formatting::{render_error, write_output};

/// Run the upload command.
pub async fn run_upload(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    verbose: bool,
    surface: SurfaceArgs,
    owner: Option<String>,
    report: ReportArgs,
) -> ExitCode {
    let body = match upload(raw_args, config_path, verbose, &surface, owner).await {
        Ok(body) => body,
        Err(err) => return render_error(err, report.format, report.output),
    };
    if let Err(err) = write_output(&body, report.format, report.output.clone()) {
        return render_error(SnapshareError::Config(err.to_string()), report.format, report.output);
    }
    ExitCode::SUCCESS
}

async fn upload(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    verbose: bool,
    surface_args: &SurfaceArgs,
    owner: Option<String>,
) -> Result<SnapshotOutput, SnapshareError> {
    let prepared = prepare_capture(raw_args, config_path.as_deref(), verbose, surface_args).await?;
    let client = Arc::new(supabase_client(&prepared.config)?);
    let persistence = PersistenceClient::new(client.clone(), client);

    let artifact = prepared
        .engine
        .capture(&prepared.surface, &prepared.options)
        .await?;
    if verbose {
        eprintln!("Uploading {} bytes\u{2026}", artifact.len());
    }
    let record = persistence
        .upload(artifact, &prepared.config.naming(owner))
        .await?;

    let link = match &prepared.config.share.base_url {
        Some(base) => Some(ShareLink::new(base, record.id.clone())?.url),
        None => None,
    };

    Ok(SnapshotOutput::Upload(UploadOutput {
        version: SNAPSHARE_OUTPUT_VERSION.to_string(),
        id: record.id,
        blob_address: record.blob_address,
        owner_id: record.owner_id,
        created_at: record.created_at,
        link,
    }))
}
