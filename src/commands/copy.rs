use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use chrono::Utc;
use snapshare_lib::{
    copy_to_clipboard, download_filename, save_download, ClipboardError, CopyOutput, ScreenKey,
    SnapshareError, SnapshotOutput, SystemClipboard, SNAPSHARE_OUTPUT_VERSION,
};

use crate::cli::{DownloadArgs, ReportArgs, SurfaceArgs};
use crate::commands::common::{prepare_capture, raster_descriptor};
use crate::formatting::{render_error, write_output};
use crate::settings::resolve_download_dir;

/// Run the copy command.
pub async fn run_copy(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    verbose: bool,
    surface: SurfaceArgs,
    fallback_download: bool,
    download: DownloadArgs,
    report: ReportArgs,
) -> ExitCode {
    let body = match copy(raw_args, config_path, verbose, &surface, fallback_download, download)
        .await
    {
        Ok(body) => body,
        Err(err) => return render_error(err, report.format, report.output),
    };
    if let Err(err) = write_output(&body, report.format, report.output.clone()) {
        return render_error(SnapshareError::Config(err.to_string()), report.format, report.output);
    }
    ExitCode::SUCCESS
}

async fn copy(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    verbose: bool,
    surface_args: &SurfaceArgs,
    fallback_download: bool,
    download: DownloadArgs,
) -> Result<SnapshotOutput, SnapshareError> {
    let prepared = prepare_capture(raw_args, config_path.as_deref(), verbose, surface_args).await?;
    let artifact = prepared
        .engine
        .capture(&prepared.surface, &prepared.options)
        .await?;
    let raster = raster_descriptor(&artifact);

    match copy_to_clipboard(&artifact, Arc::new(SystemClipboard)).await {
        Ok(()) => Ok(SnapshotOutput::Copy(CopyOutput {
            version: SNAPSHARE_OUTPUT_VERSION.to_string(),
            raster,
            copied: true,
            fallback_path: None,
            notification: None,
        })),
        Err(err) if fallback_download => {
            log::warn!("Clipboard copy failed, saving a download instead: {err}");
            let notification = clipboard_notification(&err);
            let key = ScreenKey::new(download.screen, download.gender);
            let name = download_filename(&prepared.config.download.app_name, &key, Utc::now());
            let dir = resolve_download_dir(download.out_dir, &prepared.config);
            let path = save_download(&artifact, &dir, &name).await?;
            Ok(SnapshotOutput::Copy(CopyOutput {
                version: SNAPSHARE_OUTPUT_VERSION.to_string(),
                raster,
                copied: false,
                fallback_path: Some(path),
                notification: Some(notification),
            }))
        }
        Err(err) => Err(err.into()),
    }
}

fn clipboard_notification(err: &ClipboardError) -> String {
    format!(
        "{} Saved a download instead.",
        SnapshareError::from(err.clone()).notification()
    )
}
