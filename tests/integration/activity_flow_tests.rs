//! Integration tests for the log-directory watcher feeding touch messages.

use std::fs::OpenOptions;
use std::io::Write;
use std::time::Duration;

use agent_warden::activity::ActivityWatcher;
use agent_warden::orchestrator::monitor_loop::{ActivitySource, MonitorMessage};
use tokio::sync::mpsc;

async fn next_touch(rx: &mut mpsc::Receiver<MonitorMessage>) -> (String, ActivitySource) {
    let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("touch within timeout")
        .expect("channel open");
    match message {
        MonitorMessage::Touch { worker_id, source } => (worker_id, source),
        other => panic!("expected touch, got {other:?}"),
    }
}

fn append(path: &std::path::Path, line: &str) {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("open");
    writeln!(file, "{line}").expect("append");
}

#[tokio::test]
async fn worker_log_write_touches_worker() {
    let temp = tempfile::tempdir().expect("tempdir");
    let logs = temp.path().join("logs");
    let (tx, mut rx) = mpsc::channel(64);
    let watcher = ActivityWatcher::start(&logs, tx).expect("watcher");
    assert_eq!(watcher.logs_dir(), logs.as_path());

    append(&logs.join("build-1.log"), "cargo build");

    let (worker_id, source) = next_touch(&mut rx).await;
    assert_eq!(worker_id, "build-1");
    assert_eq!(source, ActivitySource::WorkerLog);
}

#[tokio::test]
async fn event_stream_append_touches_named_worker() {
    let temp = tempfile::tempdir().expect("tempdir");
    let logs = temp.path().join("logs");
    let (tx, mut rx) = mpsc::channel(64);
    let _watcher = ActivityWatcher::start(&logs, tx).expect("watcher");

    append(
        &logs.join("events.jsonl"),
        r#"{"source":"doc-1","event":"file_written"}"#,
    );

    let (worker_id, source) = next_touch(&mut rx).await;
    assert_eq!(worker_id, "doc-1");
    assert_eq!(source, ActivitySource::EventStream);
}

#[tokio::test]
async fn orchestration_log_is_not_a_worker() {
    let temp = tempfile::tempdir().expect("tempdir");
    let logs = temp.path().join("logs");
    let (tx, mut rx) = mpsc::channel(64);
    let _watcher = ActivityWatcher::start(&logs, tx).expect("watcher");

    append(&logs.join("orchestration.log"), "spawned workers");
    append(&logs.join("test-1.log"), "running tests");

    // The first touch to arrive belongs to the real worker log.
    let (worker_id, _) = next_touch(&mut rx).await;
    assert_eq!(worker_id, "test-1");
}

#[tokio::test]
async fn dropping_the_watcher_stops_touches() {
    let temp = tempfile::tempdir().expect("tempdir");
    let logs = temp.path().join("logs");
    let (tx, mut rx) = mpsc::channel(64);
    let watcher = ActivityWatcher::start(&logs, tx).expect("watcher");
    drop(watcher);

    append(&logs.join("build-1.log"), "late write");

    // The only sender lived inside the watcher, so the channel closes once
    // the notify thread has shut down.
    tokio::time::timeout(Duration::from_secs(5), async {
        while rx.recv().await.is_some() {}
    })
    .await
    .expect("channel closes");
}
