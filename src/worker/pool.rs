//! Trial scheduling and result collection.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info};

use crate::cancel::{CancelReason, CancelToken};
use crate::checkpoint::CheckpointStore;
use crate::config::ConfigError;
use crate::error::{Error, Result};
use crate::executor::TrialExecutor;
use crate::progress::{NoProgress, ProgressSink};
use crate::source::{Order, Plan, SourceError, TrialPair};

use super::admission::Admission;
use super::trial::{StatsSnapshot, SuccessGate, TrialContext, TrialStats};

/// Default number of concurrent trials.
pub const DEFAULT_WORKERS: usize = 10;

/// Default per-trial timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A pair the target accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Success {
    pub pair: TrialPair,
    /// Report from the executor, if any
    pub message: Option<String>,
}

impl std::fmt::Display for Success {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Success: identity={:?} secret={:?}",
            self.pair.identity, self.pair.secret
        )?;
        if let Some(message) = &self.message {
            write!(f, "\n{}", message)?;
        }
        Ok(())
    }
}

/// Immutable per-run settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSettings {
    /// Maximum trials in flight
    pub workers: usize,
    /// Stop after the first success
    pub first_only: bool,
    pub order: Order,
    /// Handed to every executor call
    pub trial_timeout: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            first_only: false,
            order: Order::default(),
            trial_timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// Every generated pair was dispatched
    Exhausted,
    /// The cancellation token fired
    Cancelled(CancelReason),
}

/// Final report of a run.
#[derive(Debug)]
pub struct RunSummary {
    /// Why dispatch ended
    pub termination: Termination,
    /// Successes not already taken through [`Run::results`] and friends
    pub successes: Vec<Success>,
    /// Counters at the end of the run
    pub stats: StatsSnapshot,
    /// Candidate files that could not be opened or read
    pub source_errors: Vec<SourceError>,
    /// Wall time since start
    pub elapsed: Duration,
}

/// Dispatches pairs to a [`TrialExecutor`] with bounded concurrency.
pub struct Scheduler {
    settings: RunSettings,
    executor: Arc<dyn TrialExecutor>,
    checkpoints: Arc<dyn CheckpointStore>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancelToken,
}

impl Scheduler {
    /// Creates a scheduler with no progress reporting.
    pub fn new(
        settings: RunSettings,
        executor: Arc<dyn TrialExecutor>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            settings,
            executor,
            checkpoints,
            progress: Arc::new(NoProgress),
            cancel: CancelToken::new(),
        }
    }

    /// Reports progress to `sink`.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    /// The token this scheduler's run will observe. Clone it before
    /// [`start`](Self::start) to cancel from elsewhere, e.g. a signal handler.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Get the settings
    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Starts dispatching the plan's pairs on a background thread.
    pub fn start(self, plan: Plan) -> Result<Run> {
        let workers = self.settings.workers;
        if workers == 0 {
            return Err(ConfigError::InvalidWorkers(workers).into());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("trial-worker-{}", i))
            .build()?;

        let expected = plan.estimate();
        info!(
            "Starting {} trials ({}, {} workers{})",
            expected,
            self.settings.order,
            workers,
            if self.settings.first_only { ", first success only" } else { "" }
        );
        self.progress.start(expected);

        let stats = Arc::new(TrialStats::new());
        let (result_tx, result_rx) = bounded(workers * 2);
        let ctx = TrialContext {
            executor: self.executor,
            checkpoints: self.checkpoints,
            progress: self.progress,
            cancel: self.cancel.clone(),
            gate: SuccessGate::new(),
            stats: stats.clone(),
            first_only: self.settings.first_only,
            timeout: self.settings.trial_timeout,
        };
        let order = self.settings.order;

        let handle = thread::Builder::new()
            .name("trial-dispatch".into())
            .spawn(move || dispatch(pool, ctx, plan, order, workers, result_tx))?;

        Ok(Run {
            handle: Some(handle),
            result_rx,
            cancel: self.cancel,
            stats,
            expected,
            start_time: Instant::now(),
        })
    }
}

struct DispatchReport {
    source_errors: Vec<SourceError>,
}

/// Feeds pairs into the pool until the generator runs dry or the run is
/// cancelled, then waits for every admitted trial.
fn dispatch(
    pool: rayon::ThreadPool,
    ctx: TrialContext,
    plan: Plan,
    order: Order,
    workers: usize,
    result_tx: Sender<Success>,
) -> DispatchReport {
    let admission = Admission::new(workers);
    let mut pairs = plan.pairs(order);
    debug!(identities = pairs.identity_count(), %order, "Pair generator ready");
    let ctx = &ctx;
    let results = &result_tx;

    pool.in_place_scope(|scope| {
        for pair in pairs.by_ref() {
            if ctx.cancel.is_cancelled() {
                debug!("Cancelled, no longer admitting pairs");
                break;
            }
            let Some(permit) = admission.acquire(&ctx.cancel) else {
                debug!("Cancelled while waiting for a free worker");
                break;
            };
            ctx.stats.dispatched.fetch_add(1, Ordering::Relaxed);
            scope.spawn(move |_| {
                let _permit = permit;
                ctx.run(pair, results);
            });
        }
        debug!("All admitted pairs submitted, waiting for workers");
    });

    ctx.progress.finish();
    info!("All workers have completed");
    DispatchReport {
        source_errors: pairs.take_errors(),
    }
}

/// Handle to a running scheduler. Successes arrive in completion order.
pub struct Run {
    /// Dispatch thread; taken by `join` or `Drop`
    handle: Option<JoinHandle<DispatchReport>>,
    result_rx: Receiver<Success>,
    cancel: CancelToken,
    stats: Arc<TrialStats>,
    expected: u64,
    start_time: Instant,
}

impl Run {
    /// Waits for a success with timeout.
    ///
    /// Returns `None` on timeout or once the run is over.
    pub fn wait_for_result(&self, timeout: Duration) -> Option<Success> {
        self.result_rx.recv_timeout(timeout).ok()
    }

    /// Attempts to receive a success without blocking.
    pub fn try_recv(&self) -> Option<Success> {
        self.result_rx.try_recv().ok()
    }

    /// Blocking iterator over successes; ends when the run is over.
    pub fn results(&self) -> impl Iterator<Item = Success> + '_ {
        self.result_rx.iter()
    }

    /// Stops admitting new pairs. Trials already running finish normally.
    pub fn stop(&self) {
        self.cancel.cancel(CancelReason::Requested);
    }

    /// Token that cancels this run when fired.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Check if the run has been cancelled for any reason
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Get current statistics
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Estimated total trial count, computed at start.
    pub fn expected_total(&self) -> u64 {
        self.expected
    }

    /// Get elapsed time since start
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Get completed trials per second
    pub fn trials_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.stats.completed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Waits for the run to finish and returns its summary.
    ///
    /// Successes nobody received yet are collected into the summary.
    pub fn join(mut self) -> Result<RunSummary> {
        let successes: Vec<Success> = self.result_rx.iter().collect();
        let report = self
            .handle
            .take()
            .map(|h| h.join().map_err(|_| Error::DispatchPanicked))
            .transpose()?;

        let termination = match self.cancel.reason() {
            Some(reason) => Termination::Cancelled(reason),
            None => Termination::Exhausted,
        };
        let stats = self.stats.snapshot();
        info!(
            "Run finished ({:?}): {} trials, {} successes",
            termination, stats.completed, stats.successes
        );

        Ok(RunSummary {
            termination,
            successes,
            stats,
            source_errors: report.map(|r| r.source_errors).unwrap_or_default(),
            elapsed: self.elapsed(),
        })
    }
}

impl Drop for Run {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.stop();
            // Workers may be blocked on a full result channel.
            while self.result_rx.recv().is_ok() {}
            let _ = handle.join();
        }
    }
}
