use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;

/// Records fetched so far against the first page's reported total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HarvestProgress {
    pub fetched: u64,
    pub total: u64,
}

impl HarvestProgress {
    /// Fraction in `0.0..=1.0`; an empty total counts as done.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.fetched as f64 / self.total as f64).min(1.0)
    }
}

/// Receives progress after each page, in completion order.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, progress: HarvestProgress);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn emit(&self, _progress: HarvestProgress) {}
}

pub struct ChannelProgressSink {
    tx: mpsc::Sender<HarvestProgress>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::Sender<HarvestProgress>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, progress: HarvestProgress) {
        let _ = self.tx.send(progress);
    }
}

/// Pollable counter for callers that prefer to sample progress.
#[derive(Debug, Default)]
pub struct ProgressCounter {
    fetched: AtomicU64,
    total: AtomicU64,
}

impl ProgressCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> HarvestProgress {
        HarvestProgress {
            fetched: self.fetched.load(Ordering::Acquire),
            total: self.total.load(Ordering::Acquire),
        }
    }
}

impl ProgressSink for ProgressCounter {
    fn emit(&self, progress: HarvestProgress) {
        self.total.store(progress.total, Ordering::Release);
        self.fetched.fetch_max(progress.fetched, Ordering::AcqRel);
    }
}
