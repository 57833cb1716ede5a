use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};
use arboard::Clipboard;
use serde::Serialize;
use url::Url;

use crate::feed::Video;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharePayload {
    pub title: String,
    pub text: String,
    pub url: String,
}

impl SharePayload {
    pub fn for_video(video: &Video, base_url: &str) -> Self {
        let url = Url::parse(base_url)
            .and_then(|base| base.join(&video.id))
            .map(|url| url.to_string())
            .unwrap_or_else(|_| format!("{}{}", base_url, video.id));
        let title = if video.author.trim().is_empty() {
            "Check out this video".to_string()
        } else {
            format!("Video by {}", video.author.trim())
        };
        Self {
            title,
            text: video.caption.trim().to_string(),
            url,
        }
    }
}

/// Host capabilities sharing relies on.
pub trait ShareHost {
    /// `None` when the host has no native share capability.
    fn native_share(&mut self, payload: &SharePayload) -> Option<Result<()>>;
    fn copy_to_clipboard(&mut self, text: &str) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareOutcome {
    Shared,
    Copied,
    Failed,
}

/// Hands the payload to the host. Never fails; failures are logged.
pub fn share(host: &mut dyn ShareHost, payload: &SharePayload) -> ShareOutcome {
    match host.native_share(payload) {
        Some(Ok(())) => return ShareOutcome::Shared,
        Some(Err(err)) => {
            log::warn!("share: native share failed: {err:#}");
            return ShareOutcome::Failed;
        }
        None => {}
    }
    match host.copy_to_clipboard(&payload.url) {
        Ok(()) => ShareOutcome::Copied,
        Err(err) => {
            log::warn!("share: clipboard copy failed: {err:#}");
            ShareOutcome::Failed
        }
    }
}

/// Terminal host: an optional configured share command, else the system
/// clipboard.
pub struct SystemShareHost {
    command: Vec<String>,
}

impl SystemShareHost {
    pub fn new(command: Vec<String>) -> Self {
        Self { command }
    }
}

impl ShareHost for SystemShareHost {
    fn native_share(&mut self, payload: &SharePayload) -> Option<Result<()>> {
        let (program, args) = self.command.split_first()?;
        let mut command = Command::new(program);
        for arg in args {
            command.arg(
                arg.replace("%URL%", &payload.url)
                    .replace("%TITLE%", &payload.title)
                    .replace("%TEXT%", &payload.text),
            );
        }
        command.stdin(Stdio::null());
        command.stdout(Stdio::null());
        command.stderr(Stdio::null());
        let result = command
            .status()
            .with_context(|| format!("launch share command {program}"))
            .and_then(|status| {
                if status.success() {
                    Ok(())
                } else {
                    Err(anyhow!("share command exited with {status}"))
                }
            });
        Some(result)
    }

    fn copy_to_clipboard(&mut self, text: &str) -> Result<()> {
        let mut clipboard =
            Clipboard::new().map_err(|err| anyhow!("create clipboard context: {}", err))?;
        clipboard
            .set_text(text.to_string())
            .map_err(|err| anyhow!("copy share link: {}", err))?;
        Ok(())
    }
}
