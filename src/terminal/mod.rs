//! Terminal-control abstraction over the multiplexer hosting the workers.
//!
//! The [`TerminalController`] trait decouples the monitor loop and the
//! action executor from tmux so tests can substitute an in-memory terminal.

pub mod tmux;

use std::future::Future;
use std::pin::Pin;

use crate::models::worker::SessionHandle;
use crate::Result;

/// Boxed future returned by the collaborator traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read and drive the terminals the workers run in.
pub trait TerminalController: Send + Sync {
    /// Capture up to `max_lines` of recent output from a worker's terminal.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::SnapshotUnavailable`](crate::AppError::SnapshotUnavailable)
    /// if the pane cannot be read or produced no output.
    fn capture<'a>(
        &'a self,
        handle: &'a SessionHandle,
        max_lines: u32,
    ) -> BoxFuture<'a, Result<String>>;

    /// Type `keys` into a worker's terminal.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ActionDispatch`](crate::AppError::ActionDispatch)
    /// if the keystrokes could not be delivered.
    fn send_keys<'a>(&'a self, handle: &'a SessionHandle, keys: &'a str)
        -> BoxFuture<'a, Result<()>>;

    /// Whether the session hosting the workers exists.
    fn session_exists(&self) -> BoxFuture<'_, bool>;
}

pub use tmux::TmuxTerminal;
