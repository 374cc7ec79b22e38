mod cli;
mod commands;
mod formatting;
mod settings;

use std::process::ExitCode;

use cli::Commands;
use commands::{run_capture, run_copy, run_resolve, run_share, run_upload};

#[tokio::main]
async fn main() -> ExitCode {
    run().await
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .try_init();
}

async fn run() -> ExitCode {
    let raw_args: Vec<String> = std::env::args().collect();
    let args = cli::parse();
    init_logging(args.verbose);

    match args.command {
        Commands::Capture {
            surface,
            download,
            report,
        } => run_capture(&raw_args, args.config, args.verbose, surface, download, report).await,
        Commands::Copy {
            surface,
            fallback_download,
            download,
            report,
        } => {
            run_copy(
                &raw_args,
                args.config,
                args.verbose,
                surface,
                fallback_download,
                download,
                report,
            )
            .await
        }
        Commands::Upload {
            surface,
            owner,
            report,
        } => run_upload(&raw_args, args.config, args.verbose, surface, owner, report).await,
        Commands::Share {
            surface,
            owner,
            regenerate,
            share_command,
            report,
        } => {
            run_share(
                &raw_args,
                args.config,
                args.verbose,
                surface,
                owner,
                regenerate,
                share_command,
                report,
            )
            .await
        }
        Commands::Resolve {
            target,
            save,
            report,
        } => run_resolve(args.config, args.verbose, target, save, report).await,
    }
}
