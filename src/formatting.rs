use std::fmt::Write as FmtWrite;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use snapshare_lib::{ErrorOutput, ShareOutcome, SnapshareError, SnapshotOutput, SNAPSHARE_OUTPUT_VERSION};

use crate::cli::OutputFormat;

/// Write output in the requested format.
pub fn write_output(
    body: &SnapshotOutput,
    format: OutputFormat,
    output: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => write_json_output(body, output.as_deref())?,
        OutputFormat::Pretty => write_pretty_output(body, output.as_deref())?,
    };
    Ok(())
}

/// Render an error and return the fatal exit code.
pub fn render_error(err: SnapshareError, format: OutputFormat, output: Option<PathBuf>) -> ExitCode {
    log::debug!("Command failed: {err:?}");
    let error_payload = err.to_payload();
    let payload = SnapshotOutput::Error(ErrorOutput {
        version: SNAPSHARE_OUTPUT_VERSION.to_string(),
        message: Some(err.notification()),
        error: error_payload,
    });

    match format {
        OutputFormat::Json => {
            let content =
                serde_json::to_string(&payload).unwrap_or_else(|_| "{\"mode\":\"error\"}".into());
            if let Some(path) = output {
                if let Err(write_err) = std::fs::write(&path, &content) {
                    eprintln!("Failed to write error output: {}", write_err);
                    println!("{content}");
                }
            } else {
                println!("{content}");
            }
        }
        OutputFormat::Pretty => {
            if let Err(write_err) = write_pretty_output(&payload, output.as_deref()) {
                eprintln!("Failed to write error output: {}", write_err);
            }
        }
    };

    ExitCode::from(2)
}

/// Write JSON output to file or stdout.
fn write_json_output(
    body: &SnapshotOutput,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = serde_json::to_string(body)?;
    if let Some(path) = output {
        std::fs::write(path, content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Write pretty output to file or stdout.
fn write_pretty_output(body: &SnapshotOutput, output: Option<&Path>) -> io::Result<()> {
    let stdout_is_tty = std::io::stdout().is_terminal();
    let use_human = output.is_none() && stdout_is_tty;

    if use_human {
        let content = format_pretty(body, true);
        println!("{content}");
        return Ok(());
    }

    // Non-tty or file output: keep JSON shape for pipelines/files.
    let content =
        serde_json::to_string_pretty(body).unwrap_or_else(|_| "{\"mode\":\"error\"}".to_string());
    if let Some(path) = output {
        std::fs::write(path, &content)?;
    } else {
        println!("{content}");
    }
    Ok(())
}

/// Format output for human consumption in a terminal.
pub fn format_pretty(body: &SnapshotOutput, colorize: bool) -> String {
    let mut buf = String::new();
    match body {
        SnapshotOutput::Capture(out) => {
            let header = color("[CAPTURE]", "32", colorize);
            writeln!(
                buf,
                "{} {}x{} PNG ({} bytes)",
                header, out.raster.width, out.raster.height, out.raster.bytes
            )
            .ok();
            writeln!(buf, "Surface: {}", out.surface.display()).ok();
            writeln!(buf, "Saved:   {}", out.path.display()).ok();
        }
        SnapshotOutput::Copy(out) => {
            let (label, code) = if out.copied {
                ("[COPIED]", "32")
            } else {
                ("[NOT COPIED]", "33")
            };
            writeln!(
                buf,
                "{} {}x{} PNG to clipboard",
                color(label, code, colorize),
                out.raster.width,
                out.raster.height
            )
            .ok();
            if let Some(note) = &out.notification {
                writeln!(buf, "Note: {note}").ok();
            }
            if let Some(path) = &out.fallback_path {
                writeln!(buf, "Downloaded instead: {}", path.display()).ok();
            }
        }
        SnapshotOutput::Upload(out) => {
            let header = color("[UPLOAD]", "36", colorize);
            writeln!(buf, "{} Stored artifact {}", header, out.id).ok();
            writeln!(buf, "Blob:    {}", out.blob_address).ok();
            if let Some(owner) = &out.owner_id {
                writeln!(buf, "Owner:   {owner}").ok();
            }
            writeln!(buf, "Created: {}", out.created_at.to_rfc3339()).ok();
            if let Some(link) = &out.link {
                writeln!(buf, "Link:    {link}").ok();
            }
        }
        SnapshotOutput::Share(out) => {
            let header = color("[SHARE]", "34", colorize);
            let how = match out.outcome {
                ShareOutcome::NativeShareInvoked => "shared via native share",
                ShareOutcome::CopiedToClipboardFallback => "link copied to clipboard",
            };
            writeln!(buf, "{} {} ({})", header, out.url, how).ok();
            writeln!(buf, "Title: {}", out.payload.title).ok();
            writeln!(buf, "Text:  {}", out.payload.text).ok();
        }
        SnapshotOutput::Resolve(out) => {
            let header = color("[RESOLVE]", "36", colorize);
            writeln!(buf, "{} Artifact {}", header, out.id).ok();
            writeln!(buf, "Blob:    {}", out.blob_address).ok();
            writeln!(buf, "Created: {}", out.created_at.to_rfc3339()).ok();
            if let Some(path) = &out.saved_path {
                writeln!(
                    buf,
                    "Saved:   {} ({} bytes)",
                    path.display(),
                    out.saved_bytes.unwrap_or_default()
                )
                .ok();
            }
        }
        SnapshotOutput::Error(out) => {
            let header = color("[ERROR]", "31", colorize);
            let message = out
                .message
                .as_deref()
                .unwrap_or_else(|| out.error.message.as_str());
            writeln!(buf, "{} {}", header, message).ok();
            if message != out.error.message {
                writeln!(buf, "Cause: {}", out.error.message).ok();
            }
            if let Some(remediation) = &out.error.remediation {
                writeln!(buf, "Hint: {}", remediation).ok();
            }
        }
    }
    buf
}

/// Apply ANSI color codes when enabled.
fn color(text: &str, code: &str, colorize: bool) -> String {
    if colorize {
        format!("\x1b[{}m{}\x1b[0m", code, text)
    } else {
        text.to_string()
    }
}
