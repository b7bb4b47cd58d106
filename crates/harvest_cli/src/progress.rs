use std::io::{self, Write};
use std::sync::atomic::{AtomicU64, Ordering};

use harvest_engine::{HarvestProgress, ProgressSink};

/// Single-line progress on stderr, redrawn when the whole percentage moves.
#[derive(Debug, Default)]
pub struct TerminalProgress {
    last_percent: AtomicU64,
    drawn: AtomicU64,
}

impl TerminalProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ends the progress line, if one was drawn.
    pub fn finish(&self) {
        if self.drawn.load(Ordering::Acquire) > 0 {
            eprintln!();
        }
    }
}

impl ProgressSink for TerminalProgress {
    fn emit(&self, progress: HarvestProgress) {
        let percent = (progress.ratio() * 100.0).floor() as u64;
        let previous = self.last_percent.fetch_max(percent, Ordering::AcqRel);
        if percent <= previous && self.drawn.load(Ordering::Acquire) > 0 {
            return;
        }
        self.drawn.fetch_add(1, Ordering::AcqRel);
        let mut stderr = io::stderr().lock();
        let _ = write!(
            stderr,
            "\rfetched {}/{} records ({percent}%)",
            progress.fetched, progress.total
        );
        let _ = stderr.flush();
    }
}
