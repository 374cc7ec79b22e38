//! Clipboard integration for copying captured rasters and share links.
//!
//! Backends are synchronous and may block on the platform clipboard, so every
//! write is moved onto a blocking worker.
//!
//! X11 and Wayland clipboards are served by the process that owns them, and
//! the CLI exits right after a copy. On those sessions the payload is handed to
//! `wl-copy` or `xclip`, which keep serving it in the background.

use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;

use thiserror::Error;
use tokio::task;

use crate::capture::RasterArtifact;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    #[error("Clipboard image writes are not supported in this environment")]
    Unsupported,

    #[error("Clipboard access was denied: {0}")]
    PermissionDenied(String),

    #[error("Clipboard could not convert the image: {0}")]
    Conversion(String),

    #[error("Clipboard write failed: {0}")]
    Write(String),
}

/// Decoded RGBA8 pixels as the platform clipboard expects them, plus the
/// encoded PNG for handoff helpers that take `image/png`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipboardImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub png: Vec<u8>,
}

pub trait ClipboardBackend: Send + Sync {
    fn set_image(&self, image: ClipboardImage) -> Result<(), ClipboardError>;
    fn set_text(&self, text: &str) -> Result<(), ClipboardError>;
}

/// The platform clipboard.
///
/// macOS and Windows keep clipboard contents after the writer exits, so a
/// fresh `arboard` handle is opened per write. Elsewhere the write goes
/// through the session's [`HandoffCommand`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClipboard;

#[cfg(any(target_os = "macos", windows))]
impl ClipboardBackend for SystemClipboard {
    fn set_image(&self, image: ClipboardImage) -> Result<(), ClipboardError> {
        let mut clipboard = arboard::Clipboard::new().map_err(map_arboard_error)?;
        clipboard
            .set_image(arboard::ImageData {
                width: image.width as usize,
                height: image.height as usize,
                bytes: std::borrow::Cow::Owned(image.rgba),
            })
            .map_err(map_arboard_error)
    }

    fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        let mut clipboard = arboard::Clipboard::new().map_err(map_arboard_error)?;
        clipboard.set_text(text).map_err(map_arboard_error)
    }
}

#[cfg(not(any(target_os = "macos", windows)))]
impl ClipboardBackend for SystemClipboard {
    fn set_image(&self, image: ClipboardImage) -> Result<(), ClipboardError> {
        let helpers = HandoffCommand::for_session(|key| std::env::var(key).ok());
        hand_off(&helpers, Payload::Image, &image.png)
    }

    fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
        let helpers = HandoffCommand::for_session(|key| std::env::var(key).ok());
        hand_off(&helpers, Payload::Text, text.as_bytes())
    }
}

#[cfg(any(target_os = "macos", windows))]
fn map_arboard_error(err: arboard::Error) -> ClipboardError {
    match err {
        arboard::Error::ClipboardNotSupported => ClipboardError::Unsupported,
        arboard::Error::ClipboardOccupied => ClipboardError::PermissionDenied(err.to_string()),
        arboard::Error::ConversionFailure => ClipboardError::Conversion(err.to_string()),
        other => ClipboardError::Write(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    Image,
    Text,
}

/// External program that reads a payload on stdin and takes clipboard
/// ownership in a background process of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffCommand {
    pub program: String,
    pub image_args: Vec<String>,
    pub text_args: Vec<String>,
}

#[derive(Debug)]
enum HandoffError {
    Missing,
    Failed(String),
}

fn strings(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

impl HandoffCommand {
    pub fn wl_copy() -> Self {
        Self {
            program: "wl-copy".into(),
            image_args: strings(&["--type", "image/png"]),
            text_args: strings(&["--type", "text/plain;charset=utf-8"]),
        }
    }

    pub fn xclip() -> Self {
        Self {
            program: "xclip".into(),
            image_args: strings(&["-selection", "clipboard", "-t", "image/png", "-i"]),
            text_args: strings(&["-selection", "clipboard", "-i"]),
        }
    }

    /// Helpers usable in the session described by `env`, Wayland first.
    pub fn for_session(env: impl Fn(&str) -> Option<String>) -> Vec<Self> {
        let present = |key: &str| env(key).is_some_and(|value| !value.is_empty());
        let mut helpers = Vec::new();
        if present("WAYLAND_DISPLAY") {
            helpers.push(Self::wl_copy());
        }
        if present("DISPLAY") {
            helpers.push(Self::xclip());
        }
        helpers
    }

    fn run(&self, payload: Payload, bytes: &[u8]) -> Result<(), HandoffError> {
        let args = match payload {
            Payload::Image => &self.image_args,
            Payload::Text => &self.text_args,
        };
        // stderr stays closed: the forked server would otherwise hold the pipe open.
        let mut child = match Command::new(&self.program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(HandoffError::Missing),
            Err(e) => {
                return Err(HandoffError::Failed(format!(
                    "failed to start {}: {e}",
                    self.program
                )))
            }
        };

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(bytes) {
                let _ = child.wait();
                return Err(HandoffError::Failed(format!(
                    "failed to write to {}: {e}",
                    self.program
                )));
            }
        }

        let status = child.wait().map_err(|e| {
            HandoffError::Failed(format!("failed to wait for {}: {e}", self.program))
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(HandoffError::Failed(format!(
                "{} exited with {status}",
                self.program
            )))
        }
    }
}

/// Tries each helper in order. No installed helper means the clipboard is
/// unsupported here; a helper that ran and failed is a write error.
fn hand_off(
    helpers: &[HandoffCommand],
    payload: Payload,
    bytes: &[u8],
) -> Result<(), ClipboardError> {
    let mut failure = None;
    for helper in helpers {
        match helper.run(payload, bytes) {
            Ok(()) => {
                log::debug!("Clipboard handed to {}", helper.program);
                return Ok(());
            }
            Err(HandoffError::Missing) => {
                log::debug!("{} is not installed", helper.program);
            }
            Err(HandoffError::Failed(message)) => {
                log::warn!("Clipboard handoff failed: {message}");
                failure = Some(message);
            }
        }
    }
    Err(failure.map_or(ClipboardError::Unsupported, ClipboardError::Write))
}

/// Places the artifact's image on the system clipboard.
///
/// Nothing is persisted. On failure the clipboard is left as the backend left
/// it; callers are expected to offer a download instead.
pub async fn copy_to_clipboard(
    artifact: &RasterArtifact,
    backend: Arc<dyn ClipboardBackend>,
) -> Result<(), ClipboardError> {
    log::debug!(
        "Copying {}x{} raster to clipboard ({} bytes)",
        artifact.width(),
        artifact.height(),
        artifact.len()
    );
    let decoded = artifact
        .decode()
        .map_err(|e| ClipboardError::Conversion(e.to_string()))?;
    let image = ClipboardImage {
        width: decoded.width(),
        height: decoded.height(),
        rgba: decoded.into_raw(),
        png: artifact.bytes().to_vec(),
    };

    task::spawn_blocking(move || backend.set_image(image))
        .await
        .map_err(|e| ClipboardError::Write(format!("clipboard worker failed: {e}")))??;
    log::info!("Copied raster to clipboard");
    Ok(())
}

/// Places plain text on the system clipboard.
pub async fn copy_text(
    text: &str,
    backend: Arc<dyn ClipboardBackend>,
) -> Result<(), ClipboardError> {
    let text = text.to_string();
    task::spawn_blocking(move || backend.set_text(&text))
        .await
        .map_err(|e| ClipboardError::Write(format!("clipboard worker failed: {e}")))?
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::*;

    /// Records writes, or fails every write with a fixed error.
    #[derive(Default)]
    pub struct RecordingClipboard {
        pub fail_with: Option<ClipboardError>,
        pub images: Mutex<Vec<ClipboardImage>>,
        pub texts: Mutex<Vec<String>>,
    }

    impl RecordingClipboard {
        pub fn failing(err: ClipboardError) -> Self {
            Self {
                fail_with: Some(err),
                ..Default::default()
            }
        }
    }

    impl ClipboardBackend for RecordingClipboard {
        fn set_image(&self, image: ClipboardImage) -> Result<(), ClipboardError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            self.images.lock().unwrap().push(image);
            Ok(())
        }

        fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
            self.texts.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }
}
