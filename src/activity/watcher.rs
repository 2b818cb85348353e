//! Push activity source: file-system notifications on the log directory.
//!
//! [`ActivityWatcher`] uses the `notify` crate to watch `<project>/logs`.
//! Writes to `<worker>.log` and appends to `events.jsonl` are turned into
//! [`MonitorMessage::Touch`] messages for the monitor loop. The watcher never
//! triggers classification itself.
//!
//! ## Thread safety
//!
//! The `notify` callback runs on the watcher's own thread, outside the tokio
//! runtime, so it hands messages over with `blocking_send`.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::events;
use crate::orchestrator::monitor_loop::{ActivitySource, MonitorMessage};
use crate::{AppError, Result};

/// Name of the event stream inside the log directory.
pub const EVENTS_FILE: &str = "events.jsonl";
/// Orchestrator log that does not belong to any worker.
const ORCHESTRATION_LOG: &str = "orchestration.log";

/// What a changed path in the log directory means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivitySignal {
    /// A worker's own log file changed.
    WorkerLog(String),
    /// The shared event stream changed.
    EventStream,
}

/// Map a changed path to an activity signal, if it is one we care about.
#[must_use]
pub fn classify_path(path: &Path) -> Option<ActivitySignal> {
    let name = path.file_name()?.to_str()?;
    if name == EVENTS_FILE {
        return Some(ActivitySignal::EventStream);
    }
    if name == ORCHESTRATION_LOG {
        return None;
    }
    let stem = name.strip_suffix(".log")?;
    (!stem.is_empty()).then(|| ActivitySignal::WorkerLog(stem.to_owned()))
}

/// Returns `true` for events that indicate new content (create, modify).
fn is_activity(event: &Event) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
}

/// Resolve the touch message for one changed path.
fn touch_for(path: &Path) -> Option<MonitorMessage> {
    match classify_path(path)? {
        ActivitySignal::WorkerLog(worker_id) => Some(MonitorMessage::Touch {
            worker_id,
            source: ActivitySource::WorkerLog,
        }),
        ActivitySignal::EventStream => match events::last_record(path) {
            Ok(Some(record)) => {
                let worker_id = record.worker_id()?.to_owned();
                debug!(worker_id = %worker_id, event = ?record.event, "event stream update");
                Some(MonitorMessage::Touch {
                    worker_id,
                    source: ActivitySource::EventStream,
                })
            }
            Ok(None) => None,
            Err(err) => {
                warn!(%err, path = %path.display(), "failed to read event stream tail");
                None
            }
        },
    }
}

/// Watches the log directory for worker activity.
///
/// Holds a [`notify`] watcher alive for its own lifetime; dropping the
/// `ActivityWatcher` stops the subscription.
pub struct ActivityWatcher {
    _watcher: RecommendedWatcher,
    logs_dir: PathBuf,
}

impl ActivityWatcher {
    /// Start watching `logs_dir`, sending touches into `tx`.
    ///
    /// Creates `logs_dir` if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if the directory cannot be created, or
    /// `AppError::Config` if the `notify` watcher cannot be set up.
    pub fn start(logs_dir: &Path, tx: mpsc::Sender<MonitorMessage>) -> Result<Self> {
        std::fs::create_dir_all(logs_dir)?;

        let mut watcher = notify::recommended_watcher(
            move |result: std::result::Result<Event, notify::Error>| match result {
                Ok(event) if is_activity(&event) => {
                    for path in &event.paths {
                        if let Some(message) = touch_for(path) {
                            // A closed channel means the loop has stopped.
                            if tx.blocking_send(message).is_err() {
                                return;
                            }
                        }
                    }
                }
                Err(err) => {
                    warn!(%err, "log directory watcher error");
                }
                _ => {}
            },
        )
        .map_err(|err| AppError::Config(format!("failed to create log watcher: {err}")))?;

        watcher
            .watch(logs_dir, RecursiveMode::NonRecursive)
            .map_err(|err| {
                AppError::Config(format!(
                    "failed to watch log directory '{}': {err}",
                    logs_dir.display()
                ))
            })?;

        info!(path = %logs_dir.display(), "activity watcher started");

        Ok(Self {
            _watcher: watcher,
            logs_dir: logs_dir.to_path_buf(),
        })
    }

    /// Directory being watched.
    #[must_use]
    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }
}
