#![forbid(unsafe_code)]

//! `agent-warden` — supervision daemon for terminal-hosted coding agents.
//!
//! Loads the project configuration, watches worker activity, and runs
//! classification passes on workers that have gone quiet.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use agent_warden::audit::DecisionLogWriter;
use agent_warden::classifier::AnthropicClassifier;
use agent_warden::config::{GlobalConfig, ProjectLayout, DEFAULT_PROJECT_DIR};
use agent_warden::logging::{file_layer, open_operational_log};
use agent_warden::orchestrator::monitor_loop::{MonitorLoop, Producers};
use agent_warden::orchestrator::registry::WorkerRegistry;
use agent_warden::terminal::{TerminalController, TmuxTerminal};
use agent_warden::{AppError, Result};

/// Capacity of the activity channel shared by the watcher and the timer.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "agent-warden", about = "Supervise terminal-hosted coding agents", version, long_about = None)]
struct Cli {
    /// Project directory containing `config.toml`.
    #[arg(default_value = DEFAULT_PROJECT_DIR, value_parser = existing_dir)]
    project_dir: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

fn existing_dir(raw: &str) -> std::result::Result<PathBuf, String> {
    let path = PathBuf::from(raw);
    if path.is_dir() {
        Ok(path)
    } else {
        Err(format!("project directory '{raw}' does not exist"))
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    let layout = ProjectLayout::new(&args.project_dir);
    let _log_guard = init_tracing(args.log_format, &layout.status_dir())?;
    info!(project = %args.project_dir.display(), "agent-warden bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args, layout))
        .inspect_err(|err| {
            if err.is_fatal() {
                error!(%err, "agent-warden cannot start");
            } else {
                error!(%err, "agent-warden stopped with an error");
            }
        })
}

async fn run(args: Cli, layout: ProjectLayout) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_project(&args.project_dir)?;
    config.load_credentials().await?;
    info!(
        project = %config.project.slug,
        workers = config.workers.len(),
        "configuration loaded"
    );

    if !config.monitor.enabled {
        warn!("monitoring disabled in configuration");
        return Ok(());
    }
    let Some(api_key) = config.api_key.clone() else {
        warn!("no inference credential found; monitoring disabled");
        return Ok(());
    };

    // ── Verify the terminal session ─────────────────────
    let terminal = Arc::new(TmuxTerminal::new(
        config.terminal.session.clone(),
        Duration::from_secs(config.terminal.command_timeout_seconds),
    ));
    if !terminal.session_exists().await {
        return Err(AppError::SessionMissing(terminal.session().to_owned()));
    }

    // ── Build collaborators ─────────────────────────────
    let registry = Arc::new(WorkerRegistry::with_workers(
        config.worker_targets(),
        config.monitor.escalation_threshold,
    ));
    let audit = Arc::new(DecisionLogWriter::new(&layout.status_dir())?);
    let classifier = Arc::new(AnthropicClassifier::new(
        &api_key,
        &config.monitor,
        config.monitor.classifier_timeout(),
    ));

    let monitor = MonitorLoop::new(
        config.monitor.clone(),
        registry,
        terminal,
        classifier,
        audit,
        layout.clone(),
    );

    // ── Start producers and the loop ────────────────────
    let ct = CancellationToken::new();
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let producers = Producers::start(&layout, &config.monitor, &tx, &ct);
    drop(tx);

    let loop_ct = ct.clone();
    let loop_handle = tokio::spawn(monitor.run(rx, loop_ct));
    info!(watching = producers.watching(), "monitoring started");

    // ── Wait for shutdown signal ────────────────────────
    shutdown_signal().await;
    info!("shutdown signal received");
    ct.cancel();

    producers.stop().await;
    match loop_handle.await {
        Ok(stats) => info!(
            classifications = stats.classifications,
            total_cost_usd = format_args!("{:.4}", stats.total_cost_usd),
            "agent-warden shut down"
        ),
        Err(err) => warn!(%err, "monitor loop ended abnormally"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat, status_dir: &Path) -> Result<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let (file_writer, guard) = tracing_appender::non_blocking(open_operational_log(status_dir)?);

    let stdout: Box<dyn Layer<Registry> + Send + Sync> = match log_format {
        LogFormat::Text => fmt::layer().boxed(),
        LogFormat::Json => fmt::layer().json().boxed(),
    };

    tracing_subscriber::registry()
        .with(stdout)
        .with(file_layer(file_writer))
        .with(env_filter)
        .try_init()
        .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?;

    Ok(guard)
}
