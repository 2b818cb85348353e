//! Durable decision audit trail.
//!
//! Provides the [`AuditLogger`] trait and the [`DecisionRecord`] it stores.
//! The primary implementation, [`DecisionLogWriter`], appends every record to
//! a human-readable log and a JSONL stream under `<project>/status/`.

pub mod writer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::decision::{Decision, DecisionAction, TokenUsage, WorkerStatus};

/// One audited decision. Written once, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRecord {
    /// Unique record identifier.
    pub id: String,
    /// When the decision was recorded.
    pub timestamp: DateTime<Utc>,
    /// Worker the decision applies to.
    pub worker: String,
    /// Classified status.
    pub status: WorkerStatus,
    /// Recommended action.
    pub action: DecisionAction,
    /// Keystroke payload, when the classifier supplied one.
    pub keys: Option<String>,
    /// Justification text.
    pub reasoning: String,
    /// Confidence in `0..=100`.
    pub confidence: u8,
    /// Tokens and cost spent on the classification.
    pub usage: TokenUsage,
}

impl DecisionRecord {
    /// Build the record for `decision` about `worker`, stamped now.
    #[must_use]
    pub fn new(worker: &str, decision: &Decision) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            worker: worker.to_owned(),
            status: decision.status,
            action: decision.action,
            keys: decision.keys.clone(),
            reasoning: decision.justification.clone(),
            confidence: decision.confidence,
            usage: decision.usage,
        }
    }

    /// Single-line human-readable rendering.
    #[must_use]
    pub fn to_human_line(&self) -> String {
        // Newlines in the justification would break the one-line-per-record form.
        let reasoning = self.reasoning.replace(['\r', '\n'], " ");
        format!(
            "[{}] {}: status={}, action={}, confidence={}% - {}",
            self.timestamp.to_rfc3339(),
            self.worker,
            self.status,
            self.action,
            self.confidence,
            reasoning
        )
    }
}

/// Writes decision records to a persistent store.
///
/// Implementations must be [`Send`] and [`Sync`] to allow sharing across
/// async task boundaries via [`std::sync::Arc`].
pub trait AuditLogger: Send + Sync {
    /// Append a single record.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write operation fails.
    fn record(&self, record: &DecisionRecord) -> crate::Result<()>;
}

pub use writer::DecisionLogWriter;
