//! Reader for the append-only `events.jsonl` stream.
//!
//! Only the tail of the file is ever read: the last record on each change
//! (touch detection) and a bounded window when looking up a worker's most
//! recent event for classifier context.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use serde::Deserialize;

use crate::Result;

/// Bytes read from the end of the stream when looking for the last record.
const LAST_LINE_WINDOW: u64 = 64 * 1024;

/// One event-stream record. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct EventRecord {
    /// Emitting component, usually a worker id.
    #[serde(default)]
    pub source: Option<String>,
    /// Alternative worker field used by some emitters.
    #[serde(default)]
    pub worker: Option<String>,
    /// Event kind.
    #[serde(default)]
    pub event: Option<String>,
    /// Free-form event payload.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl EventRecord {
    /// Parse one JSONL line; `None` for blank or malformed lines.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        serde_json::from_str(line).ok()
    }

    /// Worker this record names (`source`, falling back to `worker`).
    #[must_use]
    pub fn worker_id(&self) -> Option<&str> {
        self.source.as_deref().or(self.worker.as_deref())
    }

    /// Whether the record names `worker_id` in either field.
    #[must_use]
    pub fn mentions(&self, worker_id: &str) -> bool {
        self.source.as_deref() == Some(worker_id) || self.worker.as_deref() == Some(worker_id)
    }

    /// Short description passed to the classifier.
    #[must_use]
    pub fn describe(&self) -> String {
        let kind = self.event.as_deref().unwrap_or("event");
        match &self.metadata {
            Some(meta) if !meta.is_null() => format!("{kind}: {meta}"),
            _ => kind.to_owned(),
        }
    }
}

/// Read at most `max_bytes` from the end of `path`, starting on a line boundary.
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be opened or read.
pub fn read_tail(path: &Path, max_bytes: u64) -> Result<String> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(max_bytes);
    file.seek(SeekFrom::Start(start))?;

    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;
    let text = String::from_utf8_lossy(&buf).into_owned();

    if start == 0 {
        return Ok(text);
    }
    // The window began mid-file; drop the partial first line.
    Ok(text
        .split_once('\n')
        .map(|(_, rest)| rest.to_owned())
        .unwrap_or_default())
}

/// Last non-blank record of the stream.
///
/// # Errors
///
/// Returns `AppError::Io` if the file cannot be read.
pub fn last_record(path: &Path) -> Result<Option<EventRecord>> {
    let tail = read_tail(path, LAST_LINE_WINDOW)?;
    Ok(tail
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .and_then(EventRecord::parse))
}

/// Most recent record naming `worker_id` within the last `window_bytes`.
///
/// Missing or unreadable streams yield `None`.
#[must_use]
pub fn last_event_for(path: &Path, worker_id: &str, window_bytes: u64) -> Option<EventRecord> {
    let tail = read_tail(path, window_bytes).ok()?;
    tail.lines()
        .rev()
        .filter_map(EventRecord::parse)
        .find(|record| record.mentions(worker_id))
}
