//! tmux-backed [`TerminalController`].
//!
//! Each operation shells out to a single `tmux` command with
//! `kill_on_drop(true)` and a per-command timeout, so a wedged tmux server
//! can never block the monitor loop.

use std::process::Output;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use super::{BoxFuture, TerminalController};
use crate::models::worker::SessionHandle;
use crate::{AppError, Result};

/// Drives worker windows inside one tmux session.
#[derive(Debug, Clone)]
pub struct TmuxTerminal {
    program: String,
    session: String,
    command_timeout: Duration,
}

impl TmuxTerminal {
    /// Control `session` through the `tmux` binary on `PATH`.
    #[must_use]
    pub fn new(session: impl Into<String>, command_timeout: Duration) -> Self {
        Self::with_program("tmux", session, command_timeout)
    }

    /// Control `session` through an explicit tmux-compatible binary.
    #[must_use]
    pub fn with_program(
        program: impl Into<String>,
        session: impl Into<String>,
        command_timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            session: session.into(),
            command_timeout,
        }
    }

    /// Session name this terminal controls.
    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    async fn run(&self, args: &[&str]) -> std::result::Result<Output, String> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args).kill_on_drop(true);

        match tokio::time::timeout(self.command_timeout, cmd.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(err)) => Err(format!("failed to run {}: {err}", self.program)),
            Err(_) => Err(format!(
                "{} {} timed out after {}s",
                self.program,
                args.first().copied().unwrap_or_default(),
                self.command_timeout.as_secs()
            )),
        }
    }
}

fn stderr_text(output: &Output) -> String {
    let text = String::from_utf8_lossy(&output.stderr).trim().to_owned();
    if text.is_empty() {
        format!("exit status {}", output.status)
    } else {
        text
    }
}

/// Last `max_lines` lines of `text`, ignoring the blank rows tmux pads the
/// visible pane with.
///
/// `capture-pane -S -N` returns N history lines plus the whole visible pane.
fn tail_lines(text: &str, max_lines: u32) -> String {
    let lines: Vec<&str> = text.trim_end().lines().collect();
    let keep = usize::try_from(max_lines).unwrap_or(usize::MAX);
    let start = lines.len().saturating_sub(keep);
    let mut tail = lines[start..].join("\n");
    if !tail.is_empty() {
        tail.push('\n');
    }
    tail
}

impl TerminalController for TmuxTerminal {
    fn capture<'a>(
        &'a self,
        handle: &'a SessionHandle,
        max_lines: u32,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let start = format!("-{max_lines}");
            let output = self
                .run(&["capture-pane", "-t", handle.as_str(), "-p", "-S", &start])
                .await
                .map_err(AppError::SnapshotUnavailable)?;

            if !output.status.success() {
                return Err(AppError::SnapshotUnavailable(format!(
                    "capture-pane {handle}: {}",
                    stderr_text(&output)
                )));
            }

            let text = tail_lines(&String::from_utf8_lossy(&output.stdout), max_lines);
            if text.trim().is_empty() {
                return Err(AppError::SnapshotUnavailable(format!(
                    "capture-pane {handle}: no output"
                )));
            }

            debug!(target = %handle, bytes = text.len(), "captured pane");
            Ok(text)
        })
    }

    fn send_keys<'a>(
        &'a self,
        handle: &'a SessionHandle,
        keys: &'a str,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let output = self
                .run(&["send-keys", "-t", handle.as_str(), keys])
                .await
                .map_err(AppError::ActionDispatch)?;

            if output.status.success() {
                Ok(())
            } else {
                Err(AppError::ActionDispatch(format!(
                    "send-keys {handle}: {}",
                    stderr_text(&output)
                )))
            }
        })
    }

    fn session_exists(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            match self.run(&["has-session", "-t", &self.session]).await {
                Ok(output) => output.status.success(),
                Err(err) => {
                    warn!(session = %self.session, %err, "has-session failed");
                    false
                }
            }
        })
    }
}
