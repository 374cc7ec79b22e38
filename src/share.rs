//! Delivers a share link through the platform share facility, falling back to
//! copying the link text to the clipboard.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;

use crate::clipboard::{copy_text, ClipboardBackend, ClipboardError};
use crate::link::ShareLink;

pub const DEFAULT_SHARE_TITLE: &str = "Check out this screenshot";
pub const DEFAULT_SHARE_TEXT: &str = "Here's a screenshot I saved!";

/// Exit status a share command uses to report that the user dismissed it.
const CANCELLED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharePayload {
    pub title: String,
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeShareError {
    #[error("Share was cancelled")]
    Cancelled,
    #[error("Native share failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait NativeShare: Send + Sync {
    async fn share(&self, payload: &SharePayload) -> Result<(), NativeShareError>;
}

/// Runs an external program as the native share facility.
///
/// Arguments may contain `{url}`, `{title}` and `{text}` placeholders.
#[derive(Debug, Clone)]
pub struct CommandShare {
    program: String,
    args: Vec<String>,
}

impl CommandShare {
    /// `None` when `argv` is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn render_args(&self, payload: &SharePayload) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{url}", &payload.url)
                    .replace("{title}", &payload.title)
                    .replace("{text}", &payload.text)
            })
            .collect()
    }
}

#[async_trait]
impl NativeShare for CommandShare {
    async fn share(&self, payload: &SharePayload) -> Result<(), NativeShareError> {
        log::debug!("Running share command '{}'", self.program);
        let output = Command::new(&self.program)
            .args(self.render_args(payload))
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| NativeShareError::Failed(format!("{}: {e}", self.program)))?;

        match output.status.code() {
            Some(0) => Ok(()),
            Some(CANCELLED_EXIT_CODE) => Err(NativeShareError::Cancelled),
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(NativeShareError::Failed(format!(
                    "{} exited with {}: {}",
                    self.program,
                    code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                    stderr.trim()
                )))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareOutcome {
    NativeShareInvoked,
    CopiedToClipboardFallback,
}

#[derive(Debug, Error)]
pub enum ShareError {
    #[error("Sharing failed{}; clipboard fallback failed: {clipboard}", native_suffix(.native))]
    Exhausted {
        native: Option<String>,
        clipboard: ClipboardError,
    },
}

fn native_suffix(native: &Option<String>) -> String {
    native
        .as_ref()
        .map(|reason| format!(" ({reason})"))
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct ShareDispatcher {
    native: Option<Arc<dyn NativeShare>>,
    clipboard: Arc<dyn ClipboardBackend>,
    title: String,
    text: String,
}

impl ShareDispatcher {
    pub fn new(native: Option<Arc<dyn NativeShare>>, clipboard: Arc<dyn ClipboardBackend>) -> Self {
        Self {
            native,
            clipboard,
            title: DEFAULT_SHARE_TITLE.to_string(),
            text: DEFAULT_SHARE_TEXT.to_string(),
        }
    }

    pub fn with_message(mut self, title: impl Into<String>, text: impl Into<String>) -> Self {
        self.title = title.into();
        self.text = text.into();
        self
    }

    pub fn payload(&self, link: &ShareLink) -> SharePayload {
        SharePayload {
            title: self.title.clone(),
            text: self.text.clone(),
            url: link.url.to_string(),
        }
    }

    /// A user cancel counts as a successful native share. Any other native
    /// failure, or no native facility, falls through to the clipboard.
    pub async fn dispatch(&self, link: &ShareLink) -> Result<ShareOutcome, ShareError> {
        let native_failure = match &self.native {
            Some(native) => match native.share(&self.payload(link)).await {
                Ok(()) => return Ok(ShareOutcome::NativeShareInvoked),
                Err(NativeShareError::Cancelled) => {
                    log::debug!("Native share dismissed by user");
                    return Ok(ShareOutcome::NativeShareInvoked);
                }
                Err(NativeShareError::Failed(reason)) => {
                    log::warn!("Native share failed, copying link instead: {reason}");
                    Some(reason)
                }
            },
            None => {
                log::debug!("No native share facility; copying link to clipboard");
                None
            }
        };

        match copy_text(link.url.as_str(), self.clipboard.clone()).await {
            Ok(()) => {
                log::info!("Copied share link {link} to clipboard");
                Ok(ShareOutcome::CopiedToClipboardFallback)
            }
            Err(clipboard) => Err(ShareError::Exhausted {
                native: native_failure,
                clipboard,
            }),
        }
    }
}
