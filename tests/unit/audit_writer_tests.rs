//! Unit tests for `DecisionLogWriter`.

use std::fs;
use std::sync::Arc;

use agent_warden::audit::{AuditLogger, DecisionLogWriter, DecisionRecord};
use agent_warden::models::decision::{
    Decision, DecisionAction, DecisionOrigin, TokenUsage, WorkerStatus,
};

fn decision(status: WorkerStatus, action: DecisionAction, reasoning: &str) -> Decision {
    Decision {
        status,
        action,
        keys: None,
        justification: reasoning.to_owned(),
        confidence: 75,
        usage: TokenUsage {
            input_tokens: 900,
            output_tokens: 40,
            cost_usd: 0.000_275,
        },
        origin: DecisionOrigin::Classifier,
    }
}

fn read_lines(path: &std::path::Path) -> Vec<String> {
    fs::read_to_string(path)
        .expect("read log")
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn new_creates_status_directory() {
    let temp = tempfile::tempdir().expect("tempdir");
    let status_dir = temp.path().join("proj").join("status");

    let writer = DecisionLogWriter::new(&status_dir).expect("writer");

    assert!(status_dir.is_dir());
    assert!(writer.human_path().ends_with("llm-decisions.log"));
    assert!(writer.jsonl_path().ends_with("llm-decisions.jsonl"));
}

#[test]
fn each_record_appends_one_line_to_both_logs_in_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    let writer = DecisionLogWriter::new(temp.path()).expect("writer");

    let workers = ["build-1", "doc-1", "test-1", "build-1"];
    for worker in workers {
        let record = DecisionRecord::new(
            worker,
            &decision(WorkerStatus::Working, DecisionAction::None, "making progress"),
        );
        writer.record(&record).expect("record");
    }

    let human = read_lines(writer.human_path());
    let jsonl = read_lines(writer.jsonl_path());
    assert_eq!(human.len(), workers.len());
    assert_eq!(jsonl.len(), workers.len());

    for (line, worker) in human.iter().zip(workers) {
        assert!(
            line.contains(&format!("] {worker}: status=WORKING, action=NONE, confidence=75% - making progress")),
            "unexpected line: {line}"
        );
    }
    let logged: Vec<String> = jsonl
        .iter()
        .map(|line| {
            serde_json::from_str::<DecisionRecord>(line)
                .expect("valid json record")
                .worker
        })
        .collect();
    assert_eq!(logged, workers);
}

#[test]
fn reopening_appends_rather_than_truncates() {
    let temp = tempfile::tempdir().expect("tempdir");
    let record = DecisionRecord::new(
        "doc-1",
        &decision(WorkerStatus::Stuck, DecisionAction::Approve, "prompt open"),
    );

    DecisionLogWriter::new(temp.path())
        .expect("writer")
        .record(&record)
        .expect("record");
    let writer = DecisionLogWriter::new(temp.path()).expect("writer reopened");
    writer.record(&record).expect("record");

    assert_eq!(read_lines(writer.human_path()).len(), 2);
    assert_eq!(read_lines(writer.jsonl_path()).len(), 2);
}

#[test]
fn jsonl_record_carries_usage_and_upper_case_enums() {
    let temp = tempfile::tempdir().expect("tempdir");
    let writer = DecisionLogWriter::new(temp.path()).expect("writer");
    let mut approve = decision(WorkerStatus::Stuck, DecisionAction::Approve, "Y/n prompt");
    approve.keys = Some("Y".into());
    writer
        .record(&DecisionRecord::new("build-1", &approve))
        .expect("record");

    let line = read_lines(writer.jsonl_path()).remove(0);
    let value: serde_json::Value = serde_json::from_str(&line).expect("json");
    assert_eq!(value["status"], "STUCK");
    assert_eq!(value["action"], "APPROVE");
    assert_eq!(value["keys"], "Y");
    assert_eq!(value["usage"]["input_tokens"], 900);
    assert!(value["id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[test]
fn multiline_reasoning_stays_on_one_line() {
    let record = DecisionRecord::new(
        "build-1",
        &decision(WorkerStatus::Error, DecisionAction::None, "first\nsecond"),
    );
    let line = record.to_human_line();
    assert!(!line.contains('\n'));
    assert!(line.ends_with("- first second"));
}

#[test]
fn concurrent_records_produce_whole_lines() {
    let temp = tempfile::tempdir().expect("tempdir");
    let writer = Arc::new(DecisionLogWriter::new(temp.path()).expect("writer"));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let writer = Arc::clone(&writer);
            std::thread::spawn(move || {
                for _ in 0..25 {
                    let record = DecisionRecord::new(
                        &format!("worker-{i}"),
                        &decision(WorkerStatus::Working, DecisionAction::None, "busy"),
                    );
                    writer.record(&record).expect("record");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("thread");
    }

    let jsonl = read_lines(writer.jsonl_path());
    assert_eq!(jsonl.len(), 100);
    for line in jsonl {
        serde_json::from_str::<DecisionRecord>(&line).expect("every line parses");
    }
}

#[cfg(target_os = "linux")]
#[test]
fn failed_jsonl_append_rolls_back_the_human_line() {
    let temp = tempfile::tempdir().expect("tempdir");
    // Every write to /dev/full fails with ENOSPC.
    std::os::unix::fs::symlink("/dev/full", temp.path().join("llm-decisions.jsonl"))
        .expect("symlink");
    let writer = DecisionLogWriter::new(temp.path()).expect("writer");

    let record = DecisionRecord::new(
        "build-1",
        &decision(WorkerStatus::Stuck, DecisionAction::Approve, "Y/n prompt"),
    );
    assert!(writer.record(&record).is_err());

    assert!(read_lines(writer.human_path()).is_empty());
}
