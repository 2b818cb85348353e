//! Running usage accounting for the monitor loop.

use tracing::info;

use super::action_executor::ActionOutcome;
use crate::models::decision::Decision;

/// Aggregate counters owned by the monitor loop.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageStats {
    /// Classifier invocations, successful or not.
    pub classifications: u64,
    /// Passes that ended in a synthesized failure decision.
    pub failures: u64,
    /// Workers skipped because no snapshot was available.
    pub skipped_snapshots: u64,
    /// Escalation signals raised.
    pub escalations: u64,
    /// Keystroke actions delivered.
    pub actions_applied: u64,
    /// Keystroke actions suppressed by the auto-approval switch.
    pub actions_skipped: u64,
    /// Input tokens billed.
    pub input_tokens: u64,
    /// Output tokens billed.
    pub output_tokens: u64,
    /// Cumulative cost in USD.
    pub total_cost_usd: f64,
}

impl UsageStats {
    /// Account for one classification pass.
    pub fn record_decision(&mut self, decision: &Decision) {
        self.classifications += 1;
        if decision.is_failure() {
            self.failures += 1;
        }
        self.input_tokens += decision.usage.input_tokens;
        self.output_tokens += decision.usage.output_tokens;
        self.total_cost_usd += decision.usage.cost_usd;
    }

    /// Account for the executed action.
    pub fn record_outcome(&mut self, outcome: ActionOutcome) {
        match outcome {
            ActionOutcome::Applied => self.actions_applied += 1,
            ActionOutcome::Skipped => self.actions_skipped += 1,
            ActionOutcome::NoOp | ActionOutcome::NotApplied | ActionOutcome::Failed => {}
        }
    }

    /// Emit the counters as one structured log line.
    pub fn log(&self, message: &str) {
        info!(
            classifications = self.classifications,
            failures = self.failures,
            skipped_snapshots = self.skipped_snapshots,
            escalations = self.escalations,
            actions_applied = self.actions_applied,
            actions_skipped = self.actions_skipped,
            input_tokens = self.input_tokens,
            output_tokens = self.output_tokens,
            total_cost_usd = format_args!("{:.4}", self.total_cost_usd),
            "{message}"
        );
    }
}
