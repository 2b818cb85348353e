//! Project configuration parsing, validation, and credential loading.
//!
//! The daemon reads `<project>/config.toml` exactly once at startup. The
//! worker list and terminal session are mandatory; every `[monitor]` knob
//! has a default so a minimal file only names the workers.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::models::worker::SessionHandle;
use crate::{AppError, Result};

/// File name of the project configuration inside the project directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory name used when no project directory is given on the command line.
pub const DEFAULT_PROJECT_DIR: &str = ".warden";

/// Keychain service under which the inference credential is stored.
const KEYRING_SERVICE: &str = "agent-warden";

/// Project identity.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProjectConfig {
    /// Human-readable project name.
    #[serde(default)]
    pub name: Option<String>,
    /// Short identifier used in log lines.
    pub slug: String,
}

/// Terminal multiplexer session hosting the workers.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct TerminalConfig {
    /// Name of the tmux session the worker windows live in.
    pub session: String,
    /// Upper bound for a single tmux command.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_seconds: u64,
}

/// One configured worker.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Stable worker identifier.
    pub id: String,
    /// Window index inside the session; defaults to the 1-based list position.
    #[serde(default)]
    pub window: Option<u32>,
}

/// Per-million-token pricing of the classifier model, in USD.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct PricingConfig {
    /// Cost of one million input tokens.
    #[serde(default = "default_input_price")]
    pub input_per_mtok: f64,
    /// Cost of one million output tokens.
    #[serde(default = "default_output_price")]
    pub output_per_mtok: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_mtok: default_input_price(),
            output_per_mtok: default_output_price(),
        }
    }
}

/// Monitoring behavior.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct MonitorSettings {
    /// Master switch; monitoring also stays off without a credential.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Classifier model identifier.
    #[serde(default = "default_model")]
    pub model: String,
    /// Seconds between stale-worker sweeps.
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    /// Idle seconds after which a worker is considered stale.
    #[serde(default = "default_stale_threshold")]
    pub stale_threshold_seconds: u64,
    /// Terminal lines captured per snapshot.
    #[serde(default = "default_max_context_lines")]
    pub max_context_lines: u32,
    /// Global auto-approval switch for `approve` / `send_keys` actions.
    #[serde(default = "default_true")]
    pub auto_approve: bool,
    /// Upper bound for one classifier call.
    #[serde(default = "default_classifier_timeout")]
    pub classifier_timeout_seconds: u64,
    /// Upper bound for one terminal snapshot.
    #[serde(default = "default_snapshot_timeout")]
    pub snapshot_timeout_seconds: u64,
    /// Characters of the worker's task file passed as context.
    #[serde(default = "default_task_excerpt_chars")]
    pub task_excerpt_chars: usize,
    /// Consecutive stuck/confused verdicts that raise an escalation.
    #[serde(default = "default_escalation_threshold")]
    pub escalation_threshold: u32,
    /// Keystrokes sent for an `approve` action without an explicit payload.
    #[serde(default = "default_approve_keys")]
    pub default_approve_keys: String,
    /// Override for the inference API base URL.
    #[serde(default)]
    pub api_base_url: Option<String>,
    /// Output token cap per classification.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Model pricing used for cost accounting.
    #[serde(default)]
    pub pricing: PricingConfig,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_model(),
            check_interval_seconds: default_check_interval(),
            stale_threshold_seconds: default_stale_threshold(),
            max_context_lines: default_max_context_lines(),
            auto_approve: true,
            classifier_timeout_seconds: default_classifier_timeout(),
            snapshot_timeout_seconds: default_snapshot_timeout(),
            task_excerpt_chars: default_task_excerpt_chars(),
            escalation_threshold: default_escalation_threshold(),
            default_approve_keys: default_approve_keys(),
            api_base_url: None,
            max_tokens: default_max_tokens(),
            pricing: PricingConfig::default(),
        }
    }
}

impl MonitorSettings {
    /// Interval between stale-worker sweeps.
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    /// Idle time after which a worker is due for classification.
    #[must_use]
    pub fn stale_threshold(&self) -> Duration {
        Duration::from_secs(self.stale_threshold_seconds)
    }

    /// Time bound applied to each classifier call.
    #[must_use]
    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier_timeout_seconds)
    }

    /// Time bound applied to each terminal snapshot.
    #[must_use]
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(self.snapshot_timeout_seconds)
    }
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    "claude-3-5-haiku-20241022".into()
}

fn default_check_interval() -> u64 {
    30
}

fn default_stale_threshold() -> u64 {
    300
}

fn default_max_context_lines() -> u32 {
    100
}

fn default_classifier_timeout() -> u64 {
    30
}

fn default_snapshot_timeout() -> u64 {
    5
}

fn default_command_timeout() -> u64 {
    5
}

fn default_task_excerpt_chars() -> usize {
    500
}

fn default_escalation_threshold() -> u32 {
    3
}

fn default_approve_keys() -> String {
    "C-m".into()
}

fn default_max_tokens() -> u32 {
    500
}

fn default_input_price() -> f64 {
    0.25
}

fn default_output_price() -> f64 {
    1.25
}

/// Configuration parsed from `<project>/config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Project identity.
    pub project: ProjectConfig,
    /// Terminal session hosting the workers.
    pub terminal: TerminalConfig,
    /// Workers to monitor.
    pub workers: Vec<WorkerConfig>,
    /// Monitoring behavior.
    #[serde(default)]
    pub monitor: MonitorSettings,
    /// Inference credential (populated at runtime, never read from TOML).
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl GlobalConfig {
    /// Load and validate configuration from the project directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file is missing, unreadable, contains
    /// invalid TOML, or fails validation.
    pub fn load_from_project(project_dir: impl AsRef<Path>) -> Result<Self> {
        Self::load_from_path(project_dir.as_ref().join(CONFIG_FILE_NAME))
    }

    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|err| {
            AppError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the inference credential from the OS keychain with env-var fallback.
    ///
    /// A missing credential is not an error: it leaves [`Self::api_key`] unset
    /// and [`Self::monitoring_enabled`] then reports `false`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` only if the keychain lookup task panicked.
    pub async fn load_credentials(&mut self) -> Result<()> {
        self.api_key = load_credential("anthropic_api_key", "ANTHROPIC_API_KEY").await?;
        Ok(())
    }

    /// Whether the classifier may be called at all.
    #[must_use]
    pub fn monitoring_enabled(&self) -> bool {
        self.monitor.enabled && self.api_key.is_some()
    }

    /// Resolve each configured worker to its terminal target.
    #[must_use]
    pub fn worker_targets(&self) -> Vec<(String, SessionHandle)> {
        self.workers
            .iter()
            .zip(1_u32..)
            .map(|(worker, position)| {
                let window = worker.window.unwrap_or(position);
                (
                    worker.id.clone(),
                    SessionHandle::for_window(&self.terminal.session, window),
                )
            })
            .collect()
    }

    fn validate(&self) -> Result<()> {
        if self.terminal.session.trim().is_empty() {
            return Err(AppError::Config("terminal.session must not be empty".into()));
        }

        if self.workers.is_empty() {
            return Err(AppError::Config("workers must not be empty".into()));
        }

        let mut seen = HashSet::new();
        for worker in &self.workers {
            if worker.id.trim().is_empty() {
                return Err(AppError::Config("worker id must not be empty".into()));
            }
            if !seen.insert(worker.id.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate worker id '{}'",
                    worker.id
                )));
            }
        }

        if self.monitor.check_interval_seconds == 0 {
            return Err(AppError::Config(
                "monitor.check_interval_seconds must be greater than zero".into(),
            ));
        }

        if self.monitor.classifier_timeout_seconds == 0 {
            return Err(AppError::Config(
                "monitor.classifier_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.monitor.snapshot_timeout_seconds == 0 {
            return Err(AppError::Config(
                "monitor.snapshot_timeout_seconds must be greater than zero".into(),
            ));
        }

        if self.monitor.max_context_lines == 0 {
            return Err(AppError::Config(
                "monitor.max_context_lines must be greater than zero".into(),
            ));
        }

        if self.monitor.escalation_threshold == 0 {
            return Err(AppError::Config(
                "monitor.escalation_threshold must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}

/// Load a single credential from OS keychain with env-var fallback.
async fn load_credential(keyring_key: &str, env_key: &str) -> Result<Option<String>> {
    let key = keyring_key.to_owned();

    // keyring is synchronous I/O.
    let keychain_result = tokio::task::spawn_blocking(move || {
        keyring::Entry::new(KEYRING_SERVICE, &key).and_then(|entry| entry.get_password())
    })
    .await
    .map_err(|err| AppError::Config(format!("keychain task panicked: {err}")))?;

    match keychain_result {
        Ok(value) if !value.trim().is_empty() => return Ok(Some(value.trim().to_owned())),
        Ok(_) => {
            warn!(key = keyring_key, "keychain entry is empty, trying env var");
        }
        Err(err) => {
            debug!(key = keyring_key, ?err, "keychain lookup failed, trying env var");
        }
    }

    Ok(env::var(env_key)
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty()))
}

/// Well-known locations inside a project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
    root: PathBuf,
}

impl ProjectLayout {
    /// Layout rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Project directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of worker logs and the event stream (watched).
    #[must_use]
    pub fn logs_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    /// Directory holding the decision audit logs.
    #[must_use]
    pub fn status_dir(&self) -> PathBuf {
        self.root.join("status")
    }

    /// Append-only event stream.
    #[must_use]
    pub fn events_file(&self) -> PathBuf {
        self.logs_dir().join(crate::activity::watcher::EVENTS_FILE)
    }

    /// Markdown file describing a worker's assigned task.
    #[must_use]
    pub fn task_file(&self, worker_id: &str) -> PathBuf {
        self.root.join("workers").join(format!("{worker_id}.md"))
    }
}
