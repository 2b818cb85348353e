//! Operational log file.
//!
//! The daemon mirrors its stdout log into `status/llm-monitor.log` so
//! escalations and final totals outlive a detached process.

use std::fs;
use std::path::Path;

use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, Layer};

use crate::{AppError, Result};

/// File name of the operational log inside the status directory.
pub const OPERATIONAL_LOG_FILE: &str = "llm-monitor.log";

/// Open `status_dir/llm-monitor.log` for appending, creating the directory.
///
/// # Errors
///
/// Returns [`AppError::Io`] if the directory or file cannot be created.
pub fn open_operational_log(status_dir: &Path) -> Result<RollingFileAppender> {
    fs::create_dir_all(status_dir).map_err(|e| {
        AppError::Io(format!(
            "failed to create status directory {}: {e}",
            status_dir.display()
        ))
    })?;

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(OPERATIONAL_LOG_FILE)
        .build(status_dir)
        .map_err(|e| AppError::Io(format!("failed to open {OPERATIONAL_LOG_FILE}: {e}")))
}

/// Plain-text layer writing to `writer`.
#[must_use]
pub fn file_layer<S, W>(writer: W) -> impl Layer<S> + Send + Sync
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    fmt::layer().with_ansi(false).with_writer(writer)
}
