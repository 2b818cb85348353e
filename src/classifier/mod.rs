//! Worker state classification.
//!
//! The [`StateClassifier`] trait is the contract with the external inference
//! capability: it receives a bounded [`ClassificationRequest`] and returns the
//! raw reply text plus token usage. Turning that reply into a typed
//! [`Decision`](crate::models::decision::Decision) is the caller's job and
//! lives in [`verdict`], so no implementation can forward an unvalidated
//! reply downstream.

pub mod anthropic;
pub mod prompt;
pub mod verdict;

use crate::models::decision::TokenUsage;
use crate::terminal::BoxFuture;
use crate::Result;

/// Input of one classification pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRequest {
    /// Worker being classified.
    pub worker_id: String,
    /// Bounded recent terminal output.
    pub snapshot: String,
    /// Most recent event-stream entry naming this worker.
    pub last_event: Option<String>,
    /// Bounded excerpt of the worker's assigned task.
    pub task_excerpt: Option<String>,
}

/// Raw classifier output, not yet validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierReply {
    /// Reply text; expected to hold one JSON verdict object.
    pub text: String,
    /// Tokens spent producing the reply.
    pub usage: TokenUsage,
}

/// External capability mapping a worker snapshot to a verdict.
pub trait StateClassifier: Send + Sync {
    /// Classify one worker.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ClassifierCall`](crate::AppError::ClassifierCall)
    /// when the capability could not be reached or refused the request.
    fn classify<'a>(
        &'a self,
        request: &'a ClassificationRequest,
    ) -> BoxFuture<'a, Result<ClassifierReply>>;
}

pub use anthropic::AnthropicClassifier;
pub use verdict::parse_reply;
