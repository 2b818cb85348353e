//! Synchronized map of per-worker monitoring state.
//!
//! Every operation takes the registry lock exactly once, so a touch from the
//! activity path and a read-modify-write from the sweep path never interleave
//! and no caller observes a half-updated [`WorkerState`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::decision::Decision;
use crate::models::worker::{DecisionEffect, SessionHandle, WorkerState};
use crate::{AppError, Result};

#[derive(Default)]
struct Inner {
    workers: HashMap<String, WorkerState>,
    /// Registration order, used for sweep ordering.
    order: Vec<String>,
}

/// Thread-safe registry of monitored workers.
pub struct WorkerRegistry {
    inner: Mutex<Inner>,
    escalation_threshold: u32,
}

impl WorkerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new(escalation_threshold: u32) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            escalation_threshold,
        }
    }

    /// Build a registry pre-populated with the given workers.
    #[must_use]
    pub fn with_workers(
        workers: impl IntoIterator<Item = (String, SessionHandle)>,
        escalation_threshold: u32,
    ) -> Self {
        let registry = Self::new(escalation_threshold);
        for (id, handle) in workers {
            registry.register(id, handle);
        }
        registry
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a worker. Re-registering an id replaces its state.
    pub fn register(&self, id: String, handle: SessionHandle) {
        let mut inner = self.lock();
        if !inner.workers.contains_key(&id) {
            inner.order.push(id.clone());
        }
        let state = WorkerState::new(id.clone(), handle, Utc::now());
        inner.workers.insert(id, state);
    }

    /// Number of registered workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().workers.len()
    }

    /// Whether no worker is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().workers.is_empty()
    }

    /// Whether `id` is a registered worker.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.lock().workers.contains_key(id)
    }

    /// Record activity for `id` now. Returns `false` for unknown workers.
    pub fn touch(&self, id: &str) -> bool {
        self.touch_at(id, Utc::now())
    }

    /// Record activity for `id` at `now`. Returns `false` for unknown workers.
    pub fn touch_at(&self, id: &str, now: DateTime<Utc>) -> bool {
        let mut inner = self.lock();
        if let Some(state) = inner.workers.get_mut(id) {
            state.touch(now);
            true
        } else {
            debug!(worker_id = id, "touch for unregistered worker ignored");
            false
        }
    }

    /// Whether `id` has been idle longer than `threshold`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown workers.
    pub fn is_stale(&self, id: &str, threshold: Duration) -> Result<bool> {
        self.is_stale_at(id, threshold, Utc::now())
    }

    /// Whether `id` has been idle longer than `threshold` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown workers.
    pub fn is_stale_at(&self, id: &str, threshold: Duration, now: DateTime<Utc>) -> Result<bool> {
        let inner = self.lock();
        inner
            .workers
            .get(id)
            .map(|state| state.is_stale(threshold, now))
            .ok_or_else(|| AppError::NotFound(format!("worker '{id}'")))
    }

    /// Apply a decision to `id`, updating status and stuck streak atomically.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` for unknown workers.
    pub fn record_decision(&self, id: &str, decision: &Decision) -> Result<DecisionEffect> {
        let threshold = self.escalation_threshold;
        let mut inner = self.lock();
        inner
            .workers
            .get_mut(id)
            .map(|state| state.apply_decision(decision, threshold))
            .ok_or_else(|| AppError::NotFound(format!("worker '{id}'")))
    }

    /// Workers that are stale and not complete, in registration order.
    #[must_use]
    pub fn due_for_classification(&self, threshold: Duration) -> Vec<(String, SessionHandle)> {
        self.due_for_classification_at(threshold, Utc::now())
    }

    /// Workers that are stale as of `now` and not complete, in registration order.
    #[must_use]
    pub fn due_for_classification_at(
        &self,
        threshold: Duration,
        now: DateTime<Utc>,
    ) -> Vec<(String, SessionHandle)> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.workers.get(id))
            .filter(|state| state.is_due(threshold, now))
            .map(|state| (state.id.clone(), state.handle.clone()))
            .collect()
    }

    /// Snapshot of one worker's state.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<WorkerState> {
        self.lock().workers.get(id).cloned()
    }

    /// Snapshot of every worker's state, in registration order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<WorkerState> {
        let inner = self.lock();
        inner
            .order
            .iter()
            .filter_map(|id| inner.workers.get(id).cloned())
            .collect()
    }
}
