//! Activity sources feeding the monitor loop.
//!
//! Covers the log-directory watcher and the event-stream reader. The
//! fixed-interval timer lives with the loop in
//! [`crate::orchestrator::timer`].

pub mod events;
pub mod watcher;

pub use watcher::ActivityWatcher;
