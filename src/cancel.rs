//! Process-wide cooperative cancellation.
//!
//! A [`CancelToken`] is a cheap clonable handle. Cancelling it flips an atomic
//! flag and disconnects an internal channel, so anything parked in
//! [`CancelToken::wait_timeout`] or selecting on [`CancelToken::signal`] wakes
//! immediately.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use tracing::info;

/// Why a run was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// External interrupt (Ctrl-C)
    Interrupt,
    /// First success surfaced in early-exit mode
    FirstSuccess,
    /// Explicit stop requested by the caller
    Requested,
}

impl std::fmt::Display for CancelReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelReason::Interrupt => write!(f, "interrupted"),
            CancelReason::FirstSuccess => write!(f, "first success"),
            CancelReason::Requested => write!(f, "stop requested"),
        }
    }
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    reason: OnceLock<CancelReason>,
    // Dropped on cancel; never sent on.
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

/// Shared cancellation handle.
#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

impl CancelToken {
    /// Creates a token in the not-cancelled state.
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                reason: OnceLock::new(),
                trigger: Mutex::new(Some(trigger)),
                signal,
            }),
        }
    }

    /// Cancels the token. The first reason recorded wins; later calls are no-ops.
    pub fn cancel(&self, reason: CancelReason) {
        let _ = self.inner.reason.set(reason);
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let mut trigger = self
            .inner
            .trigger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        drop(trigger.take());
    }

    /// Returns true once the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Returns the reason the token was cancelled, if it has been.
    pub fn reason(&self) -> Option<CancelReason> {
        self.inner.reason.get().copied()
    }

    /// Receiver that becomes disconnected on cancellation.
    ///
    /// Usable inside `crossbeam_channel::select!` alongside other operations.
    pub fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }

    /// Blocks for up to `timeout`, returning early if the token is cancelled.
    ///
    /// Returns true if the token was cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_cancelled() {
            return true;
        }
        matches!(
            self.inner.signal.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    /// Installs a Ctrl-C handler that cancels this token with [`CancelReason::Interrupt`].
    ///
    /// Only one handler can be installed per process.
    pub fn cancel_on_interrupt(&self) -> Result<(), ctrlc::Error> {
        let token = self.clone();
        ctrlc::set_handler(move || {
            info!("Interrupt received, cancelling run");
            token.cancel(CancelReason::Interrupt);
        })
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_starts_uncancelled() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        assert_eq!(token.reason(), None);
    }

    #[test]
    fn test_first_reason_wins() {
        let token = CancelToken::new();
        token.cancel(CancelReason::FirstSuccess);
        token.cancel(CancelReason::Interrupt);
        assert!(token.is_cancelled());
        assert_eq!(token.reason(), Some(CancelReason::FirstSuccess));
    }

    #[test]
    fn test_clones_share_state() {
        let token = CancelToken::new();
        let other = token.clone();
        other.cancel(CancelReason::Requested);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_wait_timeout_expires() {
        let token = CancelToken::new();
        assert!(!token.wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_wait_timeout_wakes_on_cancel() {
        let token = CancelToken::new();
        let canceller = token.clone();
        let start = Instant::now();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            canceller.cancel(CancelReason::Requested);
        });
        assert!(token.wait_timeout(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }
}
