//! Progress notifications. Display only, never consulted for control flow.

use std::sync::atomic::{AtomicU64, Ordering};

use indicatif::{ProgressBar, ProgressStyle};

/// Receives one event per finished trial.
pub trait ProgressSink: Send + Sync {
    /// Called once before dispatch with the estimated trial count.
    fn start(&self, _expected: u64) {}

    /// Called after each finished trial with the running completed count.
    fn completed(&self, count: u64);

    /// Called once after the last trial has finished.
    fn finish(&self) {}
}

/// Discards all progress events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn completed(&self, _count: u64) {}
}

/// Terminal progress bar.
pub struct ProgressBarSink {
    bar: ProgressBar,
    high_water: AtomicU64,
}

impl ProgressBarSink {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} tests ({per_sec}) {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        bar.set_message("Testing credentials");
        Self {
            bar,
            high_water: AtomicU64::new(0),
        }
    }
}

impl Default for ProgressBarSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ProgressBarSink {
    fn start(&self, expected: u64) {
        self.bar.set_length(expected);
        self.bar.reset();
    }

    fn completed(&self, count: u64) {
        // Events from different workers may arrive out of order.
        let prev = self.high_water.fetch_max(count, Ordering::Relaxed);
        if count > prev {
            self.bar.set_position(count);
        }
    }

    fn finish(&self) {
        self.bar.finish_with_message("Done");
    }
}
