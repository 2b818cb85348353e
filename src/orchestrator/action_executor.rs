//! Applies (or suppresses) a decision's action and records it.
//!
//! Every decision is appended to the audit log before anything else happens,
//! whatever its action and whether or not auto-approval is on.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::audit::{AuditLogger, DecisionRecord};
use crate::models::decision::{Decision, DecisionAction};
use crate::models::worker::SessionHandle;
use crate::terminal::TerminalController;

/// What happened when a decision was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    /// `NONE`: nothing to do.
    NoOp,
    /// Keystrokes were delivered.
    Applied,
    /// Keystroke action suppressed because auto-approval is off.
    Skipped,
    /// `INTERVENE`: left for a human; not applied.
    NotApplied,
    /// Keystroke delivery failed.
    Failed,
}

impl ActionOutcome {
    /// Whether the decision's action is considered successfully handled.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::NoOp | Self::Applied)
    }
}

/// Executes decisions against the worker terminals.
pub struct ActionExecutor {
    terminal: Arc<dyn TerminalController>,
    audit: Arc<dyn AuditLogger>,
    auto_approve: bool,
    default_approve_keys: String,
}

impl ActionExecutor {
    /// Construct an executor.
    #[must_use]
    pub fn new(
        terminal: Arc<dyn TerminalController>,
        audit: Arc<dyn AuditLogger>,
        auto_approve: bool,
        default_approve_keys: String,
    ) -> Self {
        Self {
            terminal,
            audit,
            auto_approve,
            default_approve_keys,
        }
    }

    /// Whether keystroke actions are forwarded.
    #[must_use]
    pub fn auto_approve(&self) -> bool {
        self.auto_approve
    }

    /// Record `decision` and carry out its action for `worker_id`.
    pub async fn execute(
        &self,
        worker_id: &str,
        handle: &SessionHandle,
        decision: &Decision,
    ) -> ActionOutcome {
        let record = DecisionRecord::new(worker_id, decision);
        if let Err(err) = self.audit.record(&record) {
            warn!(worker_id, %err, "failed to append decision to audit log");
        }

        if decision.action.sends_keys() && !self.auto_approve {
            info!(
                worker_id,
                action = %decision.action,
                "auto-approve disabled, skipping action"
            );
            return ActionOutcome::Skipped;
        }

        match decision.action {
            DecisionAction::None => ActionOutcome::NoOp,
            DecisionAction::Intervene => {
                warn!(
                    worker_id,
                    status = %decision.status,
                    reasoning = %decision.justification,
                    "worker needs human intervention"
                );
                ActionOutcome::NotApplied
            }
            DecisionAction::Approve | DecisionAction::SendKeys => {
                let keys = decision
                    .keys
                    .as_deref()
                    .unwrap_or(self.default_approve_keys.as_str());

                info!(
                    worker_id,
                    action = %decision.action,
                    keys,
                    reasoning = %decision.justification,
                    "sending keys to worker"
                );

                match self.terminal.send_keys(handle, keys).await {
                    Ok(()) => {
                        info!(worker_id, "action executed");
                        ActionOutcome::Applied
                    }
                    Err(err) => {
                        error!(worker_id, %err, "failed to execute action");
                        ActionOutcome::Failed
                    }
                }
            }
        }
    }
}
