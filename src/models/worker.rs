//! Per-worker monitoring state.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::decision::{Decision, WorkerStatus};

/// Opaque reference to a worker's terminal target (`session:window` for tmux).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionHandle(String);

impl SessionHandle {
    /// Wrap an existing target string.
    #[must_use]
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    /// Target a numbered window inside a session.
    #[must_use]
    pub fn for_window(session: &str, window: u32) -> Self {
        Self(format!("{session}:{window}"))
    }

    /// Raw target string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What recording a decision did to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionEffect {
    /// Status before the decision.
    pub previous: WorkerStatus,
    /// Status after the decision.
    pub current: WorkerStatus,
    /// Streak length after the decision.
    pub consecutive_stuck_count: u32,
    /// `true` exactly when the streak reached the escalation threshold.
    pub escalated: bool,
}

/// Monitoring state for one worker.
#[derive(Debug, Clone)]
pub struct WorkerState {
    /// Stable worker identifier.
    pub id: String,
    /// Terminal target for snapshots and keystrokes.
    pub handle: SessionHandle,
    /// Last observed activity.
    pub last_activity: DateTime<Utc>,
    /// Current classified status.
    pub status: WorkerStatus,
    /// Most recent decision, if any.
    pub last_decision: Option<Decision>,
    /// Consecutive stuck/confused verdicts.
    pub consecutive_stuck_count: u32,
}

impl WorkerState {
    /// Fresh state for a worker first seen at `now`.
    #[must_use]
    pub fn new(id: String, handle: SessionHandle, now: DateTime<Utc>) -> Self {
        Self {
            id,
            handle,
            last_activity: now,
            status: WorkerStatus::Starting,
            last_decision: None,
            consecutive_stuck_count: 0,
        }
    }

    /// Record activity at `now` and clear the stuck streak.
    ///
    /// `last_activity` strictly increases even when `now` does not advance
    /// past the previous value (clock resolution, skew).
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = if now > self.last_activity {
            now
        } else {
            self.last_activity + chrono::Duration::nanoseconds(1)
        };
        self.consecutive_stuck_count = 0;
    }

    /// Time since the last activity; zero if `now` is earlier.
    #[must_use]
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        (now - self.last_activity).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the worker has been idle strictly longer than `threshold`.
    #[must_use]
    pub fn is_stale(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        self.idle_for(now) > threshold
    }

    /// Whether a sweep at `now` should classify this worker.
    #[must_use]
    pub fn is_due(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        !self.status.is_terminal() && self.is_stale(threshold, now)
    }

    /// Apply a decision's status and update the stuck streak.
    ///
    /// Stuck/confused verdicts extend the streak, other verdicts reset it,
    /// and synthesized failures leave it untouched. `escalated` is set only
    /// on the transition that makes the streak equal `escalation_threshold`.
    pub fn apply_decision(&mut self, decision: &Decision, escalation_threshold: u32) -> DecisionEffect {
        let previous = self.status;
        self.status = decision.status;

        let mut escalated = false;
        if decision.status.counts_toward_escalation() {
            self.consecutive_stuck_count = self.consecutive_stuck_count.saturating_add(1);
            escalated = self.consecutive_stuck_count == escalation_threshold;
        } else if !decision.is_failure() {
            self.consecutive_stuck_count = 0;
        }

        self.last_decision = Some(decision.clone());

        DecisionEffect {
            previous,
            current: self.status,
            consecutive_stuck_count: self.consecutive_stuck_count,
            escalated,
        }
    }
}
