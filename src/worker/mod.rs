//! Bounded worker pool for credential trials.
//!
//! This module provides:
//! - Admission control capping trials in flight
//! - Per-pair trial tasks with early-exit coordination
//! - Result collection and run statistics

mod admission;
mod pool;
mod trial;

pub use admission::{Admission, Permit};
pub use pool::{
    Run, RunSettings, RunSummary, Scheduler, Success, Termination, DEFAULT_TIMEOUT,
    DEFAULT_WORKERS,
};
pub use trial::{StatsSnapshot, SuccessGate, TrialStats};
