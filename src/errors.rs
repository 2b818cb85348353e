//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
///
/// Only [`AppError::Config`] and [`AppError::SessionMissing`] are fatal; the
/// monitor loop converts every other kind into a logged decision or a skipped
/// worker and keeps running.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// The terminal session hosting the workers does not exist.
    SessionMissing(String),
    /// The terminal snapshot for a worker could not be captured.
    SnapshotUnavailable(String),
    /// The classifier call failed before producing a reply.
    ClassifierCall(String),
    /// The classifier reply did not conform to the verdict contract.
    ClassifierParse(String),
    /// The classifier call exceeded its time bound.
    ClassifierTimeout(String),
    /// Keystrokes could not be delivered to the worker's terminal.
    ActionDispatch(String),
    /// Audit log write failure.
    Audit(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl AppError {
    /// Whether this error must halt the daemon at startup.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_) | Self::SessionMissing(_))
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::SessionMissing(msg) => write!(f, "session missing: {msg}"),
            Self::SnapshotUnavailable(msg) => write!(f, "snapshot unavailable: {msg}"),
            Self::ClassifierCall(msg) => write!(f, "classifier call failed: {msg}"),
            Self::ClassifierParse(msg) => write!(f, "classifier reply invalid: {msg}"),
            Self::ClassifierTimeout(msg) => write!(f, "classifier timeout: {msg}"),
            Self::ActionDispatch(msg) => write!(f, "action dispatch failed: {msg}"),
            Self::Audit(msg) => write!(f, "audit: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
