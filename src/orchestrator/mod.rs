//! Worker supervision.
//!
//! Covers the worker registry, the sweep timer, the single monitor loop that
//! runs classification passes, and the executor that applies their actions.

pub mod action_executor;
pub mod context;
pub mod monitor_loop;
pub mod registry;
pub mod stats;
pub mod timer;
