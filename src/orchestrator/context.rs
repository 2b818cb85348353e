//! Optional classifier context: last event and task excerpt per worker.

use crate::activity::events;
use crate::config::ProjectLayout;

/// Bytes of the event stream searched for a worker's latest event.
const EVENT_SEARCH_WINDOW: u64 = 256 * 1024;

/// Reads the supplementary context for a classification pass.
///
/// Every lookup is best effort: a missing or unreadable source yields `None`.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    layout: ProjectLayout,
    task_excerpt_chars: usize,
}

impl WorkerContext {
    /// Build a context reader rooted at `layout`.
    #[must_use]
    pub fn new(layout: ProjectLayout, task_excerpt_chars: usize) -> Self {
        Self {
            layout,
            task_excerpt_chars,
        }
    }

    /// Most recent event naming `worker_id`, rendered for the prompt.
    #[must_use]
    pub fn last_event(&self, worker_id: &str) -> Option<String> {
        events::last_event_for(&self.layout.events_file(), worker_id, EVENT_SEARCH_WINDOW)
            .map(|record| record.describe())
    }

    /// First characters of `workers/<id>.md`.
    #[must_use]
    pub fn task_excerpt(&self, worker_id: &str) -> Option<String> {
        let raw = std::fs::read_to_string(self.layout.task_file(worker_id)).ok()?;
        excerpt(raw.trim(), self.task_excerpt_chars)
    }
}

/// Truncate on a character boundary, marking the cut with `...`.
fn excerpt(text: &str, max_chars: usize) -> Option<String> {
    if text.is_empty() || max_chars == 0 {
        return None;
    }
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => Some(format!("{}...", &text[..cut])),
        None => Some(text.to_owned()),
    }
}
