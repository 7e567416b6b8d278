//! # cred_trial
//!
//! Bounded-concurrency credential trial pipeline.
//!
//! ## Architecture
//!
//! - `source`: Candidate streams, resume, pair generation and trial estimates
//! - `worker`: Admission-controlled scheduling, early exit and result collection
//! - `checkpoint`: Best-effort resume state
//! - `executor`: Contract for the component that attempts authentication
//! - `cancel`: Process-wide cooperative cancellation
//! - `config`: Runtime configuration
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use cred_trial::{
//!     CancelToken, Config, JsonCheckpointStore, Outcome, Scheduler, TrialExecutor,
//! };
//!
//! struct Target;
//!
//! impl TrialExecutor for Target {
//!     fn attempt(&self, _: &str, _: &str, _: &CancelToken, _: Duration) -> Outcome {
//!         Outcome::auth_failure()
//!     }
//! }
//!
//! # fn main() -> cred_trial::Result<()> {
//! let config = Config {
//!     identity_list: Some("users.txt".into()),
//!     secret_list: Some("pass.txt".into()),
//!     resume: true,
//!     ..Config::default()
//! };
//! let store = Arc::new(JsonCheckpointStore::new(config.state_path()));
//! let plan = config.plan(store.as_ref())?;
//!
//! let scheduler = Scheduler::new(config.settings(), Arc::new(Target), store);
//! scheduler.cancel_token().cancel_on_interrupt()?;
//!
//! let run = scheduler.start(plan)?;
//! for success in run.results() {
//!     println!("{}", success);
//! }
//! let summary = run.join()?;
//! println!("{:?}", summary.termination);
//! # Ok(())
//! # }
//! ```

pub mod cancel;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod progress;
pub mod source;
pub mod worker;

pub use cancel::{CancelReason, CancelToken};
pub use checkpoint::{Checkpoint, CheckpointStore, JsonCheckpointStore, MemoryCheckpointStore};
pub use config::Config;
pub use error::{Error, Result};
pub use executor::{FollowOn, Outcome, OutcomeKind, TrialExecutor};
pub use progress::{NoProgress, ProgressBarSink, ProgressSink};
pub use source::{Order, PairGenerator, Plan, Source, TrialPair};
pub use worker::{Run, RunSettings, RunSummary, Scheduler, Success, Termination};
