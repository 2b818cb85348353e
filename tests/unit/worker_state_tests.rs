//! Unit tests for per-worker state transitions.

use std::time::Duration;

use agent_warden::models::decision::{Decision, DecisionAction, DecisionOrigin, TokenUsage, WorkerStatus};
use agent_warden::models::worker::{SessionHandle, WorkerState};
use chrono::{TimeZone, Utc};

const THRESHOLD: u32 = 3;

fn t0() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn worker() -> WorkerState {
    WorkerState::new("build-1".into(), SessionHandle::new("agents:1"), t0())
}

fn verdict(status: WorkerStatus) -> Decision {
    Decision {
        status,
        action: DecisionAction::None,
        keys: None,
        justification: "test".into(),
        confidence: 80,
        usage: TokenUsage::default(),
        origin: DecisionOrigin::Classifier,
    }
}

#[test]
fn new_worker_starts_idle_and_unclassified() {
    let state = worker();
    assert_eq!(state.status, WorkerStatus::Starting);
    assert_eq!(state.consecutive_stuck_count, 0);
    assert!(state.last_decision.is_none());
}

#[test]
fn touch_strictly_increases_last_activity() {
    let mut state = worker();
    let before = state.last_activity;

    // Same instant: still moves forward.
    state.touch(t0());
    assert!(state.last_activity > before);

    // Clock going backwards: still moves forward.
    let after_first = state.last_activity;
    state.touch(t0() - chrono::Duration::seconds(5));
    assert!(state.last_activity > after_first);

    // Normal progress: takes the new time.
    let later = t0() + chrono::Duration::seconds(10);
    state.touch(later);
    assert_eq!(state.last_activity, later);
}

#[test]
fn touch_resets_stuck_streak() {
    let mut state = worker();
    state.apply_decision(&verdict(WorkerStatus::Stuck), THRESHOLD);
    state.apply_decision(&verdict(WorkerStatus::Stuck), THRESHOLD);
    assert_eq!(state.consecutive_stuck_count, 2);

    state.touch(t0() + chrono::Duration::seconds(1));
    assert_eq!(state.consecutive_stuck_count, 0);
}

#[test]
fn stale_only_strictly_after_threshold() {
    let state = worker();
    let threshold = Duration::from_secs(300);

    assert!(!state.is_stale(threshold, t0() + chrono::Duration::seconds(299)));
    assert!(!state.is_stale(threshold, t0() + chrono::Duration::seconds(300)));
    assert!(state.is_stale(threshold, t0() + chrono::Duration::seconds(301)));
}

#[test]
fn clock_skew_never_makes_worker_stale() {
    let state = worker();
    let earlier = t0() - chrono::Duration::hours(1);
    assert_eq!(state.idle_for(earlier), Duration::ZERO);
    assert!(!state.is_stale(Duration::ZERO, earlier));
}

#[test]
fn escalation_fires_once_at_third_consecutive_stuck() {
    let mut state = worker();

    let first = state.apply_decision(&verdict(WorkerStatus::Stuck), THRESHOLD);
    let second = state.apply_decision(&verdict(WorkerStatus::Confused), THRESHOLD);
    let third = state.apply_decision(&verdict(WorkerStatus::Stuck), THRESHOLD);
    let fourth = state.apply_decision(&verdict(WorkerStatus::Stuck), THRESHOLD);

    assert!(!first.escalated);
    assert!(!second.escalated);
    assert!(third.escalated);
    assert_eq!(third.consecutive_stuck_count, 3);
    assert!(!fourth.escalated, "no repeat escalation beyond the threshold");
    assert_eq!(fourth.consecutive_stuck_count, 4);
}

#[test]
fn validated_progress_resets_streak() {
    let mut state = worker();
    state.apply_decision(&verdict(WorkerStatus::Stuck), THRESHOLD);
    state.apply_decision(&verdict(WorkerStatus::Stuck), THRESHOLD);

    let effect = state.apply_decision(&verdict(WorkerStatus::Working), THRESHOLD);
    assert_eq!(effect.consecutive_stuck_count, 0);
    assert_eq!(effect.previous, WorkerStatus::Stuck);
    assert_eq!(effect.current, WorkerStatus::Working);

    // A fresh streak is needed before escalating again.
    state.apply_decision(&verdict(WorkerStatus::Stuck), THRESHOLD);
    let effect = state.apply_decision(&verdict(WorkerStatus::Stuck), THRESHOLD);
    assert!(!effect.escalated);
}

#[test]
fn failure_decision_leaves_streak_unchanged() {
    let mut state = worker();
    state.apply_decision(&verdict(WorkerStatus::Stuck), THRESHOLD);
    state.apply_decision(&verdict(WorkerStatus::Stuck), THRESHOLD);

    let effect = state.apply_decision(&Decision::failure("classifier timeout"), THRESHOLD);
    assert_eq!(effect.current, WorkerStatus::Error);
    assert_eq!(effect.consecutive_stuck_count, 2);
    assert!(!effect.escalated);

    // The streak continues across the failure.
    let effect = state.apply_decision(&verdict(WorkerStatus::Stuck), THRESHOLD);
    assert!(effect.escalated);
}

#[test]
fn complete_worker_is_never_due() {
    let mut state = worker();
    state.apply_decision(&verdict(WorkerStatus::Complete), THRESHOLD);

    let much_later = t0() + chrono::Duration::days(1);
    assert!(state.is_stale(Duration::from_secs(300), much_later));
    assert!(!state.is_due(Duration::from_secs(300), much_later));
}
