//! Fixed-size admission control.

use crossbeam_channel::{bounded, select, Receiver, Sender};

use crate::cancel::CancelToken;

/// Counting semaphore over a bounded channel: a slot is held while its token
/// sits in the channel.
#[derive(Debug)]
pub struct Admission {
    slots: Sender<()>,
    held: Receiver<()>,
}

/// A held slot. Dropping it frees the slot.
#[derive(Debug)]
pub struct Permit {
    held: Receiver<()>,
}

impl Admission {
    pub fn new(limit: usize) -> Self {
        let (slots, held) = bounded(limit);
        Self { slots, held }
    }

    pub fn limit(&self) -> usize {
        self.slots.capacity().unwrap_or(0)
    }

    /// Number of slots currently held.
    pub fn in_use(&self) -> usize {
        self.slots.len()
    }

    /// Blocks until a slot frees or `cancel` fires.
    ///
    /// Returns `None` on cancellation; no slot is held in that case.
    pub fn acquire(&self, cancel: &CancelToken) -> Option<Permit> {
        if cancel.is_cancelled() {
            return None;
        }
        let signal = cancel.signal();
        let admitted = select! {
            send(self.slots, ()) -> res => res.is_ok(),
            recv(signal) -> _ => false,
        };
        if !admitted {
            return None;
        }
        let permit = Permit {
            held: self.held.clone(),
        };
        // Both arms can be ready at once; cancellation takes priority.
        if cancel.is_cancelled() {
            return None;
        }
        Some(permit)
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        let _ = self.held.try_recv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelReason;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_limit_and_release() {
        let admission = Admission::new(2);
        let token = CancelToken::new();
        let a = admission.acquire(&token).unwrap();
        let _b = admission.acquire(&token).unwrap();
        assert_eq!(admission.in_use(), 2);
        drop(a);
        assert_eq!(admission.in_use(), 1);
        assert_eq!(admission.limit(), 2);
    }

    #[test]
    fn test_blocked_acquire_wakes_on_release() {
        let admission = Admission::new(1);
        let token = CancelToken::new();
        let held = admission.acquire(&token).unwrap();
        let releaser = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            drop(held);
        });
        assert!(admission.acquire(&token).is_some());
        releaser.join().unwrap();
    }

    #[test]
    fn test_blocked_acquire_wakes_on_cancel() {
        let admission = Admission::new(1);
        let token = CancelToken::new();
        let _held = admission.acquire(&token).unwrap();

        let canceller = token.clone();
        let start = Instant::now();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            canceller.cancel(CancelReason::Requested);
        });
        assert!(admission.acquire(&token).is_none());
        assert!(start.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
        assert_eq!(admission.in_use(), 1);
    }

    #[test]
    fn test_cancelled_never_admits() {
        let admission = Admission::new(4);
        let token = CancelToken::new();
        token.cancel(CancelReason::Requested);
        assert!(admission.acquire(&token).is_none());
        assert_eq!(admission.in_use(), 0);
    }
}
