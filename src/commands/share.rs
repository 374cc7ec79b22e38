use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use snapshare_lib::{
    ArtifactSource, CommandShare, Freshness, NativeShare, ShareDispatcher, ShareOutput,
    SnapshareError, SnapshotOutput, SystemClipboard, SNAPSHARE_OUTPUT_VERSION,
};

use crate::cli::{ReportArgs, SurfaceArgs};
use crate::commands::common::{link_resolver, prepare_capture, share_base_url, supabase_client};
use crate::formatting::{render_error, write_output};

/// Run the share command.
#[allow(clippy::too_many_arguments)]
pub async fn run_share(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    verbose: bool,
    surface: SurfaceArgs,
    owner: Option<String>,
    regenerate: bool,
    share_command: Option<Vec<String>>,
    report: ReportArgs,
) -> ExitCode {
    let body = match share(
        raw_args,
        config_path,
        verbose,
        &surface,
        owner,
        regenerate,
        share_command,
    )
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

async fn share(
    raw_args: &[String],
    config_path: Option<PathBuf>,
    verbose: bool,
    surface_args: &SurfaceArgs,
    owner: Option<String>,
    regenerate: bool,
    share_command: Option<Vec<String>>,
) -> Result<SnapshotOutput, SnapshareError> {
    let prepared = prepare_capture(raw_args, config_path.as_deref(), verbose, surface_args).await?;
    let base_url = share_base_url(&prepared.config)?;
    let client = Arc::new(supabase_client(&prepared.config)?);
    let resolver = link_resolver(prepared.engine.clone(), client, base_url)?;

    let naming = prepared.config.naming(owner);
    let link = resolver
        .get_or_create_share_link(ArtifactSource {
            surface: &prepared.surface,
            options: &prepared.options,
            naming: &naming,
            freshness: if regenerate {
                Freshness::Regenerate
            } else {
                Freshness::ReuseLatest
            },
        })
        .await?;
    if verbose {
        eprintln!("Share link: {link}");
    }

    let argv = share_command.or_else(|| prepared.config.share.command.clone());
    let native = argv
        .as_deref()
        .and_then(CommandShare::from_argv)
        .map(|command| Arc::new(command) as Arc<dyn NativeShare>);
    let dispatcher = ShareDispatcher::new(native, Arc::new(SystemClipboard))
        .with_message(&prepared.config.share.title, &prepared.config.share.text);

    let outcome = dispatcher.dispatch(&link).await?;
    Ok(SnapshotOutput::Share(ShareOutput {
        version: SNAPSHARE_OUTPUT_VERSION.to_string(),
        payload: dispatcher.payload(&link),
        id: link.id,
        url: link.url,
        outcome,
    }))
}
