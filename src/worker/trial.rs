//! A single trial task and the state it shares with its siblings.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::Sender;
use tracing::{debug, error, info, warn};

use crate::cancel::{CancelReason, CancelToken};
use crate::checkpoint::CheckpointStore;
use crate::executor::{Outcome, OutcomeKind, TrialExecutor};
use crate::progress::ProgressSink;
use crate::source::TrialPair;

use super::Success;

/// Counters shared by every trial of a run.
#[derive(Debug, Default)]
pub struct TrialStats {
    /// Pairs admitted to the pool
    pub dispatched: AtomicU64,
    /// Trials that ran to an outcome, panicked ones included
    pub completed: AtomicU64,
    /// Successes forwarded to the caller
    pub successes: AtomicU64,
    /// Target reachable, credentials rejected
    pub auth_failures: AtomicU64,
    /// Target unreachable or timed out
    pub no_connection: AtomicU64,
    /// Executor calls that panicked
    pub panicked: AtomicU64,
    /// Admitted but not attempted because a success was already surfaced
    pub skipped: AtomicU64,
    /// Checkpoint writes that failed
    pub checkpoint_failures: AtomicU64,
}

impl TrialStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            dispatched: self.dispatched.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            successes: self.successes.load(Ordering::Relaxed),
            auth_failures: self.auth_failures.load(Ordering::Relaxed),
            no_connection: self.no_connection.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            checkpoint_failures: self.checkpoint_failures.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`TrialStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Pairs admitted to the pool
    pub dispatched: u64,
    /// Trials that ran to an outcome
    pub completed: u64,
    /// Successes forwarded to the caller
    pub successes: u64,
    /// Rejected credentials
    pub auth_failures: u64,
    /// Unreachable target
    pub no_connection: u64,
    /// Executor panics, counted as failed trials
    pub panicked: u64,
    /// Admitted but never attempted
    pub skipped: u64,
    /// Failed checkpoint writes
    pub checkpoint_failures: u64,
}

/// "Has a success been surfaced yet" flag for early-exit runs.
///
/// Check-and-set and the cancellation it triggers happen under one lock, so
/// two racing winners cannot both claim it.
#[derive(Debug, Default)]
pub struct SuccessGate {
    claimed: Mutex<bool>,
}

impl SuccessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a success has been surfaced.
    pub fn is_claimed(&self) -> bool {
        *self.lock()
    }

    /// Claims the gate and cancels the run. Returns false if already claimed.
    pub fn claim(&self, cancel: &CancelToken) -> bool {
        let mut claimed = self.lock();
        if *claimed {
            return false;
        }
        *claimed = true;
        cancel.cancel(CancelReason::FirstSuccess);
        true
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, bool> {
        self.claimed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Everything a trial task needs, shared across the run.
pub(crate) struct TrialContext {
    pub executor: Arc<dyn TrialExecutor>,
    /// Records the last attempted pair
    pub checkpoints: Arc<dyn CheckpointStore>,
    pub progress: Arc<dyn ProgressSink>,
    pub cancel: CancelToken,
    /// Only consulted when `first_only` is set
    pub gate: SuccessGate,
    pub stats: Arc<TrialStats>,
    /// Stop after the first success
    pub first_only: bool,
    /// Handed to every executor call
    pub timeout: Duration,
}

impl TrialContext {
    /// Runs one pair to completion.
    ///
    /// Failures stay here, executor panics included. Successes go to
    /// `results` unless an earlier success already claimed an early-exit run.
    pub fn run(&self, pair: TrialPair, results: &Sender<Success>) {
        if self.first_only && self.gate.is_claimed() {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.executor
                .attempt(&pair.identity, &pair.secret, &self.cancel, self.timeout)
        }));
        match attempt {
            Ok(outcome) => self.record(&pair, outcome, results),
            Err(payload) => {
                self.stats.panicked.fetch_add(1, Ordering::Relaxed);
                error!(
                    identity = %pair.identity,
                    "Executor panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }

        let done = self.stats.completed.fetch_add(1, Ordering::Relaxed) + 1;
        self.progress.completed(done);

        if let Err(e) = self.checkpoints.save(&pair) {
            self.stats.checkpoint_failures.fetch_add(1, Ordering::Relaxed);
            warn!("{}", e);
        }
    }

    fn record(&self, pair: &TrialPair, outcome: Outcome, results: &Sender<Success>) {
        debug!(identity = %pair.identity, outcome = %outcome.kind, "Trial finished");

        match outcome.kind {
            OutcomeKind::NoConnection => {
                self.stats.no_connection.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeKind::AuthFailure => {
                self.stats.auth_failures.fetch_add(1, Ordering::Relaxed);
            }
            OutcomeKind::Success => {
                if !self.first_only || self.gate.claim(&self.cancel) {
                    self.stats.successes.fetch_add(1, Ordering::Relaxed);
                    info!(identity = %pair.identity, "Credentials accepted");
                    if self.first_only {
                        info!("First success found, cancelling remaining trials");
                    }
                    // The receiver only disappears once the run is torn down.
                    let _ = results.send(Success {
                        pair: pair.clone(),
                        message: outcome.message,
                    });
                } else {
                    debug!(identity = %pair.identity, "Discarding success after first");
                }
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
