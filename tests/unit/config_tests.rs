//! Unit tests for project configuration parsing and validation.

use std::time::Duration;

use agent_warden::config::{GlobalConfig, ProjectLayout, CONFIG_FILE_NAME};
use agent_warden::AppError;

const MINIMAL: &str = r#"
[project]
slug = "shop"

[terminal]
session = "shop-agents"

[[workers]]
id = "build-1"

[[workers]]
id = "doc-1"
"#;

fn expect_config_error(raw: &str, needle: &str) {
    match GlobalConfig::from_toml_str(raw) {
        Err(AppError::Config(msg)) => assert!(
            msg.contains(needle),
            "error should mention '{needle}', got: {msg}"
        ),
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn minimal_config_applies_monitor_defaults() {
    let config = GlobalConfig::from_toml_str(MINIMAL).expect("minimal config parses");

    assert_eq!(config.project.slug, "shop");
    assert_eq!(config.terminal.session, "shop-agents");
    assert_eq!(config.workers.len(), 2);
    assert!(config.api_key.is_none());

    let monitor = &config.monitor;
    assert!(monitor.enabled);
    assert!(monitor.auto_approve);
    assert_eq!(monitor.check_interval(), Duration::from_secs(30));
    assert_eq!(monitor.stale_threshold(), Duration::from_secs(300));
    assert_eq!(monitor.max_context_lines, 100);
    assert_eq!(monitor.escalation_threshold, 3);
    assert_eq!(monitor.default_approve_keys, "C-m");
}

#[test]
fn monitor_section_overrides_defaults() {
    let raw = format!(
        "{MINIMAL}
[monitor]
check_interval_seconds = 10
stale_threshold_seconds = 60
auto_approve = false
model = \"claude-test\"

[monitor.pricing]
input_per_mtok = 1.0
output_per_mtok = 2.0
"
    );
    let config = GlobalConfig::from_toml_str(&raw).expect("config parses");

    assert_eq!(config.monitor.check_interval(), Duration::from_secs(10));
    assert_eq!(config.monitor.stale_threshold(), Duration::from_secs(60));
    assert!(!config.monitor.auto_approve);
    assert_eq!(config.monitor.model, "claude-test");
    assert!((config.monitor.pricing.output_per_mtok - 2.0).abs() < f64::EPSILON);
    // Untouched knobs keep their defaults.
    assert_eq!(config.monitor.max_context_lines, 100);
}

#[test]
fn worker_targets_default_to_position() {
    let raw = r#"
[project]
slug = "shop"

[terminal]
session = "agents"

[[workers]]
id = "build-1"

[[workers]]
id = "doc-1"
window = 7

[[workers]]
id = "test-1"
"#;
    let config = GlobalConfig::from_toml_str(raw).expect("config parses");
    let targets: Vec<(String, String)> = config
        .worker_targets()
        .into_iter()
        .map(|(id, handle)| (id, handle.as_str().to_owned()))
        .collect();

    assert_eq!(
        targets,
        vec![
            ("build-1".to_owned(), "agents:1".to_owned()),
            ("doc-1".to_owned(), "agents:7".to_owned()),
            ("test-1".to_owned(), "agents:3".to_owned()),
        ]
    );
}

#[test]
fn empty_worker_list_is_rejected() {
    let raw = r#"
workers = []

[project]
slug = "shop"

[terminal]
session = "agents"
"#;
    expect_config_error(raw, "workers must not be empty");
}

#[test]
fn duplicate_worker_ids_are_rejected() {
    let raw = r#"
[project]
slug = "shop"

[terminal]
session = "agents"

[[workers]]
id = "build-1"

[[workers]]
id = "build-1"
"#;
    expect_config_error(raw, "duplicate worker id 'build-1'");
}

#[test]
fn blank_session_is_rejected() {
    let raw = r#"
[project]
slug = "shop"

[terminal]
session = "  "

[[workers]]
id = "build-1"
"#;
    expect_config_error(raw, "terminal.session");
}

#[test]
fn zero_check_interval_is_rejected() {
    let raw = format!("{MINIMAL}\n[monitor]\ncheck_interval_seconds = 0\n");
    expect_config_error(&raw, "check_interval_seconds");
}

#[test]
fn zero_timeouts_are_rejected() {
    let raw = format!("{MINIMAL}\n[monitor]\nclassifier_timeout_seconds = 0\n");
    expect_config_error(&raw, "classifier_timeout_seconds");

    let raw = format!("{MINIMAL}\n[monitor]\nsnapshot_timeout_seconds = 0\n");
    expect_config_error(&raw, "snapshot_timeout_seconds");
}

#[test]
fn missing_terminal_section_is_a_config_error() {
    let raw = r#"
[project]
slug = "shop"

[[workers]]
id = "build-1"
"#;
    assert!(matches!(
        GlobalConfig::from_toml_str(raw),
        Err(AppError::Config(_))
    ));
}

#[test]
fn load_from_project_reads_config_file() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(temp.path().join(CONFIG_FILE_NAME), MINIMAL).expect("write config");

    let config = GlobalConfig::load_from_project(temp.path()).expect("config loads");
    assert_eq!(config.workers[0].id, "build-1");
}

#[test]
fn load_from_project_without_file_is_a_config_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let err = GlobalConfig::load_from_project(temp.path()).expect_err("missing file");
    assert!(err.is_fatal());
    assert!(err.to_string().contains(CONFIG_FILE_NAME));
}

#[test]
fn monitoring_requires_credential_and_switch() {
    let mut config = GlobalConfig::from_toml_str(MINIMAL).expect("config parses");
    assert!(!config.monitoring_enabled(), "no credential yet");

    config.api_key = Some("sk-test".into());
    assert!(config.monitoring_enabled());

    config.monitor.enabled = false;
    assert!(!config.monitoring_enabled());
}

#[test]
fn project_layout_paths() {
    let layout = ProjectLayout::new("/tmp/proj");
    assert_eq!(layout.logs_dir(), std::path::Path::new("/tmp/proj/logs"));
    assert_eq!(layout.status_dir(), std::path::Path::new("/tmp/proj/status"));
    assert_eq!(
        layout.events_file(),
        std::path::Path::new("/tmp/proj/logs/events.jsonl")
    );
    assert_eq!(
        layout.task_file("doc-1"),
        std::path::Path::new("/tmp/proj/workers/doc-1.md")
    );
}
