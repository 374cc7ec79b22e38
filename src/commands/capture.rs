use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Utc;
use snapshare_lib::{
    download_filename, save_download, CaptureOutput, ScreenKey, SnapshareError, SnapshotOutput,
    SNAPSHARE_OUTPUT_VERSION,
};

use crate::cli::{DownloadArgs, ReportArgs, SurfaceArgs};
use crate::commands::common::{prepare_capture, raster_descriptor};
use crate::formatting::{render_error, write_output};
use crate::settings::resolve_download_dir;

/// Run the capture command.
pub async fn run_capture(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    verbose: bool,
    surface: SurfaceArgs,
    download: DownloadArgs,
    report: ReportArgs,
) -> ExitCode {
    let body = match capture_to_download(raw_args, config_path, verbose, &surface, download).await
    {
        Ok(body) => body,
        Err(err) => return render_error(err, report.format, report.output),
    };
    if let Err(err) = write_output(&body, report.format, report.output.clone()) {
        return render_error(SnapshareError::Config(err.to_string()), report.format, report.output);
    }
    ExitCode::SUCCESS
}

async fn capture_to_download(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    verbose: bool,
    surface_args: &SurfaceArgs,
    download: DownloadArgs,
) -> Result<SnapshotOutput, SnapshareError> {
    let prepared = prepare_capture(raw_args, config_path.as_deref(), verbose, surface_args).await?;
    if verbose {
        eprintln!("Capturing surface\u{2026}");
    }
    let artifact = prepared
        .engine
        .capture(&prepared.surface, &prepared.options)
        .await?;

    let key = ScreenKey::new(download.screen, download.gender);
    let name = download_filename(&prepared.config.download.app_name, &key, Utc::now());
    let dir = resolve_download_dir(download.out_dir, &prepared.config);
    let path = save_download(&artifact, &dir, &name).await?;

    Ok(SnapshotOutput::Capture(CaptureOutput {
        version: SNAPSHARE_OUTPUT_VERSION.to_string(),
        surface: surface_args.surface.clone(),
        raster: raster_descriptor(&artifact),
        path,
    }))
}
