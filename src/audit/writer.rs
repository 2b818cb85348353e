//! Dual-format append-only decision log writer.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};

use tracing::warn;

use super::{AuditLogger, DecisionRecord};
use crate::{AppError, Result};

/// File name of the human-readable decision log.
pub const HUMAN_LOG_FILE: &str = "llm-decisions.log";
/// File name of the JSONL decision stream.
pub const JSONL_LOG_FILE: &str = "llm-decisions.jsonl";

/// Both open log files, written under one lock so their lines stay paired.
struct WriterState {
    human: BufWriter<File>,
    jsonl: BufWriter<File>,
}

/// Appends each [`DecisionRecord`] to `llm-decisions.log` and
/// `llm-decisions.jsonl` in the same directory.
///
/// Files are opened in append mode and flushed after every record, so the
/// trail survives restarts and is never rewritten.
pub struct DecisionLogWriter {
    human_path: PathBuf,
    jsonl_path: PathBuf,
    state: Mutex<WriterState>,
}

impl DecisionLogWriter {
    /// Open (or create) both logs inside `status_dir`.
    ///
    /// Creates `status_dir` and all parent directories if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Audit`] if the directory or files cannot be opened.
    pub fn new(status_dir: &Path) -> Result<Self> {
        fs::create_dir_all(status_dir).map_err(|e| {
            AppError::Audit(format!(
                "failed to create audit directory {}: {e}",
                status_dir.display()
            ))
        })?;

        let human_path = status_dir.join(HUMAN_LOG_FILE);
        let jsonl_path = status_dir.join(JSONL_LOG_FILE);
        let state = WriterState {
            human: Self::open_append(&human_path)?,
            jsonl: Self::open_append(&jsonl_path)?,
        };

        Ok(Self {
            human_path,
            jsonl_path,
            state: Mutex::new(state),
        })
    }

    /// Path of the human-readable log.
    #[must_use]
    pub fn human_path(&self) -> &Path {
        &self.human_path
    }

    /// Path of the JSONL log.
    #[must_use]
    pub fn jsonl_path(&self) -> &Path {
        &self.jsonl_path
    }

    fn open_append(path: &Path) -> Result<BufWriter<File>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AppError::Audit(format!("failed to open {}: {e}", path.display())))?;
        Ok(BufWriter::new(file))
    }
}

fn append_line(writer: &mut BufWriter<File>, line: &str, path: &Path) -> Result<()> {
    writeln!(writer, "{line}")
        .and_then(|()| writer.flush())
        .map_err(|e| {
            warn!(path = %path.display(), "failed to append decision record: {e}");
            AppError::Audit(format!("write to {} failed: {e}", path.display()))
        })
}

impl AuditLogger for DecisionLogWriter {
    fn record(&self, record: &DecisionRecord) -> Result<()> {
        let json = serde_json::to_string(record)
            .map_err(|e| AppError::Audit(format!("failed to serialize decision record: {e}")))?;
        let human = record.to_human_line();

        let mut guard = self
            .state
            .lock()
            .map_err(|_| AppError::Audit("decision log mutex poisoned".to_string()))?;

        let human_len = guard
            .human
            .get_ref()
            .metadata()
            .map_err(|e| {
                AppError::Audit(format!(
                    "failed to stat {}: {e}",
                    self.human_path.display()
                ))
            })?
            .len();

        append_line(&mut guard.human, &human, &self.human_path)?;
        if let Err(err) = append_line(&mut guard.jsonl, &json, &self.jsonl_path) {
            // Drop the human line again so both forms keep one line per decision.
            if let Err(e) = guard.human.get_ref().set_len(human_len) {
                warn!(
                    path = %self.human_path.display(),
                    "decision logs out of step, could not roll back human line: {e}"
                );
            }
            return Err(err);
        }
        Ok(())
    }
}
