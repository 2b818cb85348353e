//! Unit tests for log-directory path classification.

use std::path::Path;

use agent_warden::activity::watcher::{classify_path, ActivitySignal, EVENTS_FILE};

#[test]
fn worker_log_maps_to_worker() {
    assert_eq!(
        classify_path(Path::new("/proj/logs/build-1.log")),
        Some(ActivitySignal::WorkerLog("build-1".into()))
    );
}

#[test]
fn event_stream_is_recognized() {
    assert_eq!(
        classify_path(&Path::new("/proj/logs").join(EVENTS_FILE)),
        Some(ActivitySignal::EventStream)
    );
}

#[test]
fn orchestration_log_is_ignored() {
    assert_eq!(classify_path(Path::new("/proj/logs/orchestration.log")), None);
}

#[test]
fn unrelated_files_are_ignored() {
    assert_eq!(classify_path(Path::new("/proj/logs/notes.txt")), None);
    assert_eq!(classify_path(Path::new("/proj/logs/.log")), None);
    assert_eq!(classify_path(Path::new("/proj/logs/build-1.log.swp")), None);
}
