#![forbid(unsafe_code)]

pub mod activity;
pub mod audit;
pub mod classifier;
pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod terminal;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
