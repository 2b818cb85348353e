//! Worker status, decision actions, and the decision value produced by a
//! classification pass.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::config::PricingConfig;

/// Observed state of a worker.
///
/// `Starting` only exists before the first classification; every other
/// variant is produced by a decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerStatus {
    /// Registered, not yet classified.
    Starting,
    /// Actively making progress.
    Working,
    /// Waiting on an external process (build, tests).
    Waiting,
    /// Waiting for approval or user input.
    Stuck,
    /// Lost or asking questions it should not.
    Confused,
    /// Hit an error, or the classification itself failed.
    Error,
    /// Finished; never classified again.
    Complete,
}

impl WorkerStatus {
    /// Canonical upper-case label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "STARTING",
            Self::Working => "WORKING",
            Self::Waiting => "WAITING",
            Self::Stuck => "STUCK",
            Self::Confused => "CONFUSED",
            Self::Error => "ERROR",
            Self::Complete => "COMPLETE",
        }
    }

    /// Statuses that count toward escalation.
    #[must_use]
    pub fn counts_toward_escalation(self) -> bool {
        matches!(self, Self::Stuck | Self::Confused)
    }

    /// Whether the monitor stops classifying a worker in this status.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Parse a classifier-reported status.
    ///
    /// `starting` is not a value the classifier may report and is therefore
    /// unrecognized here.
    #[must_use]
    pub fn parse_reported(raw: &str) -> Recognized<Self> {
        match normalize(raw).as_str() {
            "working" => Recognized::Known(Self::Working),
            "stuck" => Recognized::Known(Self::Stuck),
            "waiting" => Recognized::Known(Self::Waiting),
            "complete" => Recognized::Known(Self::Complete),
            "confused" => Recognized::Known(Self::Confused),
            "error" => Recognized::Known(Self::Error),
            _ => Recognized::Unrecognized(raw.to_owned()),
        }
    }
}

impl Display for WorkerStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Corrective action recommended by a decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionAction {
    /// Confirm a pending prompt.
    Approve,
    /// Type a specific keystroke payload.
    SendKeys,
    /// A human must look at the worker.
    Intervene,
    /// Leave the worker alone.
    None,
}

impl DecisionAction {
    /// Canonical upper-case label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::SendKeys => "SEND_KEYS",
            Self::Intervene => "INTERVENE",
            Self::None => "NONE",
        }
    }

    /// Actions that forward keystrokes and are gated by auto-approval.
    #[must_use]
    pub fn sends_keys(self) -> bool {
        matches!(self, Self::Approve | Self::SendKeys)
    }

    /// Parse a classifier-reported action.
    #[must_use]
    pub fn parse_reported(raw: &str) -> Recognized<Self> {
        match normalize(raw).as_str() {
            "approve" => Recognized::Known(Self::Approve),
            "send_keys" => Recognized::Known(Self::SendKeys),
            "intervene" => Recognized::Known(Self::Intervene),
            "none" => Recognized::Known(Self::None),
            _ => Recognized::Unrecognized(raw.to_owned()),
        }
    }
}

impl Display for DecisionAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of mapping an external string onto a closed enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recognized<T> {
    /// The value is one of the enumeration's variants.
    Known(T),
    /// The value is outside the enumeration; the raw text is kept for logs.
    Unrecognized(String),
}

impl<T> Recognized<T> {
    /// Convert into a `Result`, yielding the raw text on failure.
    ///
    /// # Errors
    ///
    /// Returns the unrecognized raw value.
    pub fn known(self) -> std::result::Result<T, String> {
        match self {
            Self::Known(value) => Ok(value),
            Self::Unrecognized(raw) => Err(raw),
        }
    }
}

fn normalize(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .replace(['-', ' '], "_")
}

/// Token accounting for one classifier call.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct TokenUsage {
    /// Prompt tokens billed.
    pub input_tokens: u64,
    /// Completion tokens billed.
    pub output_tokens: u64,
    /// Derived cost in USD.
    pub cost_usd: f64,
}

impl TokenUsage {
    /// Build a usage record and derive its cost from per-million pricing.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn priced(input_tokens: u64, output_tokens: u64, pricing: &PricingConfig) -> Self {
        let cost_usd = (input_tokens as f64 * pricing.input_per_mtok
            + output_tokens as f64 * pricing.output_per_mtok)
            / 1_000_000.0;
        Self {
            input_tokens,
            output_tokens,
            cost_usd,
        }
    }
}

/// Where a decision came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOrigin {
    /// A validated classifier verdict.
    Classifier,
    /// Synthesized after a classifier timeout, call error, or invalid reply.
    Failure,
}

/// Structured outcome of one classification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Classified worker status.
    pub status: WorkerStatus,
    /// Recommended corrective action.
    pub action: DecisionAction,
    /// Keystrokes to forward for `Approve` / `SendKeys`.
    pub keys: Option<String>,
    /// Free-text justification.
    pub justification: String,
    /// Confidence in `0..=100`.
    pub confidence: u8,
    /// Resource cost of the pass.
    pub usage: TokenUsage,
    /// Whether this came from the classifier or a failure.
    pub origin: DecisionOrigin,
}

impl Decision {
    /// Synthesize the decision recorded when classification fails.
    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::failure_with_usage(reason, TokenUsage::default())
    }

    /// Synthesize a failure decision that still carries the tokens spent.
    #[must_use]
    pub fn failure_with_usage(reason: impl Into<String>, usage: TokenUsage) -> Self {
        Self {
            status: WorkerStatus::Error,
            action: DecisionAction::None,
            keys: None,
            justification: reason.into(),
            confidence: 0,
            usage,
            origin: DecisionOrigin::Failure,
        }
    }

    /// Whether this decision was synthesized from a failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.origin == DecisionOrigin::Failure
    }
}
