//! The single monitor loop.
//!
//! All activity (push touches from the log watcher, pull ticks from the
//! sweep timer) arrives on one channel and is handled here one message at a
//! time. Classification passes therefore never overlap, and a touch that
//! arrives while a pass is running is applied after that pass completes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::action_executor::{ActionExecutor, ActionOutcome};
use super::context::WorkerContext;
use super::registry::WorkerRegistry;
use super::stats::UsageStats;
use super::timer::spawn_sweep_timer;
use crate::activity::ActivityWatcher;
use crate::audit::AuditLogger;
use crate::classifier::{parse_reply, ClassificationRequest, StateClassifier};
use crate::config::{MonitorSettings, ProjectLayout};
use crate::models::decision::Decision;
use crate::models::worker::{DecisionEffect, SessionHandle};
use crate::terminal::TerminalController;
use crate::AppError;

/// Where a touch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivitySource {
    /// The worker's own log file changed.
    WorkerLog,
    /// The shared event stream named the worker.
    EventStream,
}

/// Messages consumed by [`MonitorLoop::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorMessage {
    /// Fresh activity observed for a worker.
    Touch {
        /// Worker the activity belongs to.
        worker_id: String,
        /// Which producer observed it.
        source: ActivitySource,
    },
    /// Sweep stale workers.
    ClassifyDue {
        /// When the tick was produced.
        at: Instant,
    },
}

impl MonitorMessage {
    /// A sweep request stamped with the current instant.
    #[must_use]
    pub fn classify_due() -> Self {
        Self::ClassifyDue { at: Instant::now() }
    }
}

/// Result of one classification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassOutcome {
    /// Decision recorded for the worker.
    pub decision: Decision,
    /// State change caused by the decision; `None` if the worker vanished.
    pub effect: Option<DecisionEffect>,
    /// What the executor did with the action.
    pub action: ActionOutcome,
}

/// Background producers feeding the monitor channel.
pub struct Producers {
    watcher: Option<ActivityWatcher>,
    timer: JoinHandle<()>,
    timer_cancel: CancellationToken,
}

impl Producers {
    /// Start the log watcher and the sweep timer.
    ///
    /// A watcher that cannot start is logged and monitoring continues on
    /// timer ticks alone.
    #[must_use]
    pub fn start(
        layout: &ProjectLayout,
        settings: &MonitorSettings,
        tx: &mpsc::Sender<MonitorMessage>,
        cancel: &CancellationToken,
    ) -> Self {
        let watcher = match ActivityWatcher::start(&layout.logs_dir(), tx.clone()) {
            Ok(watcher) => Some(watcher),
            Err(err) => {
                warn!(%err, "activity watcher unavailable; relying on sweeps only");
                None
            }
        };
        let timer_cancel = cancel.child_token();
        let timer = spawn_sweep_timer(tx.clone(), settings.check_interval(), timer_cancel.clone());
        Self {
            watcher,
            timer,
            timer_cancel,
        }
    }

    /// Whether the push subscription is active.
    #[must_use]
    pub fn watching(&self) -> bool {
        self.watcher.is_some()
    }

    /// Stop both producers and wait for the timer task.
    pub async fn stop(self) {
        drop(self.watcher);
        self.timer_cancel.cancel();
        if let Err(err) = self.timer.await {
            warn!(%err, "sweep timer task ended abnormally");
        }
    }
}

/// Owns the worker registry view, the collaborators, and the usage totals.
pub struct MonitorLoop {
    settings: MonitorSettings,
    registry: Arc<WorkerRegistry>,
    terminal: Arc<dyn TerminalController>,
    classifier: Arc<dyn StateClassifier>,
    executor: ActionExecutor,
    context: WorkerContext,
    stats: UsageStats,
    last_sweep_end: Option<Instant>,
}

impl MonitorLoop {
    /// Wire up a monitor loop.
    #[must_use]
    pub fn new(
        settings: MonitorSettings,
        registry: Arc<WorkerRegistry>,
        terminal: Arc<dyn TerminalController>,
        classifier: Arc<dyn StateClassifier>,
        audit: Arc<dyn AuditLogger>,
        layout: ProjectLayout,
    ) -> Self {
        let executor = ActionExecutor::new(
            Arc::clone(&terminal),
            audit,
            settings.auto_approve,
            settings.default_approve_keys.clone(),
        );
        let context = WorkerContext::new(layout, settings.task_excerpt_chars);
        Self {
            settings,
            registry,
            terminal,
            classifier,
            executor,
            context,
            stats: UsageStats::default(),
            last_sweep_end: None,
        }
    }

    /// Shared registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<WorkerRegistry> {
        &self.registry
    }

    /// Totals accumulated so far.
    #[must_use]
    pub fn stats(&self) -> &UsageStats {
        &self.stats
    }

    /// Consume messages until `cancel` fires or every sender is gone.
    ///
    /// A sweep in progress when `cancel` fires is abandoned. Returns the
    /// final usage totals.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<MonitorMessage>,
        cancel: CancellationToken,
    ) -> UsageStats {
        info!(
            workers = self.registry.len(),
            check_interval_secs = self.settings.check_interval_seconds,
            stale_threshold_secs = self.settings.stale_threshold_seconds,
            auto_approve = self.settings.auto_approve,
            "monitor loop started"
        );

        loop {
            let message = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                message = rx.recv() => match message {
                    Some(message) => message,
                    None => {
                        info!("monitor channel closed");
                        break;
                    }
                },
            };

            match message {
                MonitorMessage::Touch { worker_id, source } => {
                    self.apply_touch(&worker_id, source);
                }
                MonitorMessage::ClassifyDue { at } => {
                    // Ticks produced before the previous sweep finished are redundant.
                    if self.last_sweep_end.is_some_and(|finished| at < finished) {
                        debug!("coalescing queued sweep tick");
                        continue;
                    }
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            info!("sweep abandoned on shutdown");
                            break;
                        }
                        _ = self.sweep() => {}
                    }
                    self.last_sweep_end = Some(Instant::now());
                    self.stats.log("monitor usage");
                }
            }
        }

        rx.close();
        self.stats.log("monitor stopped");
        self.stats
    }

    /// Record a touch for `worker_id`; unknown ids are ignored.
    pub fn apply_touch(&self, worker_id: &str, source: ActivitySource) {
        if self.registry.touch(worker_id) {
            debug!(worker_id, ?source, "worker activity");
        } else {
            debug!(worker_id, ?source, "activity for unknown worker ignored");
        }
    }

    /// Classify every worker that is currently due, in registration order.
    ///
    /// Returns the completed passes.
    pub async fn sweep(&mut self) -> Vec<PassOutcome> {
        let due = self
            .registry
            .due_for_classification(self.settings.stale_threshold());
        if due.is_empty() {
            debug!("no stale workers");
            return Vec::new();
        }
        debug!(count = due.len(), "sweeping stale workers");

        let mut outcomes = Vec::with_capacity(due.len());
        for (worker_id, handle) in due {
            if let Some(outcome) = self.classify_worker(&worker_id, &handle).await {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Run one classification pass for a single worker.
    ///
    /// Returns `None` when no snapshot could be taken; the worker is then
    /// left untouched until the next sweep.
    pub async fn classify_worker(
        &mut self,
        worker_id: &str,
        handle: &SessionHandle,
    ) -> Option<PassOutcome> {
        let span = info_span!("classify", worker_id, target = %handle);
        self.classify_worker_inner(worker_id, handle)
            .instrument(span)
            .await
    }

    async fn classify_worker_inner(
        &mut self,
        worker_id: &str,
        handle: &SessionHandle,
    ) -> Option<PassOutcome> {
        let Some(snapshot) = self.capture_snapshot(handle).await else {
            self.stats.skipped_snapshots += 1;
            return None;
        };

        let request = ClassificationRequest {
            worker_id: worker_id.to_owned(),
            snapshot,
            last_event: self.context.last_event(worker_id),
            task_excerpt: self.context.task_excerpt(worker_id),
        };

        let decision = self.decide(&request).await;
        self.stats.record_decision(&decision);

        let effect = match self.registry.record_decision(worker_id, &decision) {
            Ok(effect) => Some(effect),
            Err(err) => {
                warn!(%err, "worker state not updated");
                None
            }
        };
        if let Some(effect) = effect.as_ref().filter(|effect| effect.escalated) {
            self.stats.escalations += 1;
            error!(
                consecutive = effect.consecutive_stuck_count,
                status = %decision.status,
                "worker repeatedly stuck or confused; human attention needed"
            );
        }

        let action = self.executor.execute(worker_id, handle, &decision).await;
        self.stats.record_outcome(action);

        info!(
            status = %decision.status,
            action = %decision.action,
            confidence = decision.confidence,
            cost_usd = decision.usage.cost_usd,
            outcome = ?action,
            "classification complete"
        );

        Some(PassOutcome {
            decision,
            effect,
            action,
        })
    }

    async fn capture_snapshot(&self, handle: &SessionHandle) -> Option<String> {
        let capture = self
            .terminal
            .capture(handle, self.settings.max_context_lines);
        match timeout(self.settings.snapshot_timeout(), capture).await {
            Ok(Ok(snapshot)) => Some(snapshot),
            Ok(Err(err)) => {
                warn!(%err, "no terminal snapshot; skipping worker this tick");
                None
            }
            Err(_) => {
                warn!(
                    timeout_secs = self.settings.snapshot_timeout_seconds,
                    "terminal snapshot timed out; skipping worker this tick"
                );
                None
            }
        }
    }

    /// Obtain a decision; never fails, synthesizing `ERROR` on any problem.
    async fn decide(&self, request: &ClassificationRequest) -> Decision {
        let call = self.classifier.classify(request);
        match timeout(self.settings.classifier_timeout(), call).await {
            Err(_) => {
                let err = AppError::ClassifierTimeout(format!(
                    "no reply within {}s",
                    self.settings.classifier_timeout_seconds
                ));
                warn!(%err, "classification failed");
                Decision::failure(err.to_string())
            }
            Ok(Err(err)) => {
                warn!(%err, "classification failed");
                Decision::failure(err.to_string())
            }
            Ok(Ok(reply)) => match parse_reply(&reply) {
                Ok(decision) => decision,
                Err(err) => {
                    warn!(%err, "classifier reply rejected");
                    Decision::failure_with_usage(err.to_string(), reply.usage)
                }
            },
        }
    }
}
