use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{plan_offsets, WinRecord};

/// What to do when an offset exhausts its retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// Fail the whole harvest.
    #[default]
    Abort,
    /// Keep the pages that succeeded and record the failed offsets.
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Init,
    FetchingFirst,
    Planning,
    Dispatching,
    Collecting,
    Complete,
    Aborted,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Aborted)
    }
}

/// One successfully fetched page.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub offset: u64,
    pub reported_total: i64,
    pub records: Vec<WinRecord>,
}

/// An offset that could not be fetched within its retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    pub offset: u64,
    pub attempts: u32,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HarvestWarning {
    /// A later page reported a different total than the first page.
    TotalChanged {
        offset: u64,
        first_total: i64,
        observed_total: i64,
    },
}

/// Everything collected by a finished harvest, before deduplication.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CollectedPages {
    pub total_reported: i64,
    pub records: Vec<WinRecord>,
    pub pages_succeeded: usize,
    pub failures: Vec<PageFailure>,
    pub warnings: Vec<HarvestWarning>,
}

/// Bookkeeping for a single harvest run. Driven only through [`crate::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct HarvestState {
    page_size: u64,
    mode: FailureMode,
    phase: Phase,
    total_reported: Option<i64>,
    outstanding: BTreeSet<u64>,
    pages_succeeded: usize,
    records: Vec<WinRecord>,
    failures: Vec<PageFailure>,
    warnings: Vec<HarvestWarning>,
}

impl HarvestState {
    pub fn new(page_size: u64, mode: FailureMode) -> Self {
        Self {
            page_size,
            mode,
            phase: Phase::Init,
            total_reported: None,
            outstanding: BTreeSet::new(),
            pages_succeeded: 0,
            records: Vec::new(),
            failures: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> FailureMode {
        self.mode
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn total_reported(&self) -> Option<i64> {
        self.total_reported
    }

    /// Records received so far. Never decreases.
    pub fn records_fetched(&self) -> u64 {
        self.records.len() as u64
    }

    pub fn pages_succeeded(&self) -> usize {
        self.pages_succeeded
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.len()
    }

    pub fn failures(&self) -> &[PageFailure] {
        &self.failures
    }

    pub fn warnings(&self) -> &[HarvestWarning] {
        &self.warnings
    }

    /// The failure that ended the harvest, if it was aborted.
    pub fn abort_reason(&self) -> Option<&PageFailure> {
        if self.phase == Phase::Aborted {
            self.failures.last()
        } else {
            None
        }
    }

    /// Consume a completed harvest. Returns `None` unless the phase is `Complete`.
    pub fn into_collected(self) -> Option<CollectedPages> {
        if self.phase != Phase::Complete {
            return None;
        }
        Some(CollectedPages {
            total_reported: self.total_reported.unwrap_or_default(),
            records: self.records,
            pages_succeeded: self.pages_succeeded,
            failures: self.failures,
            warnings: self.warnings,
        })
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Progress denominator; negative totals are reported as zero.
    pub(crate) fn progress_total(&self) -> u64 {
        self.total_reported.unwrap_or_default().max(0) as u64
    }

    /// Store page 0 and return the remaining offsets to dispatch.
    pub(crate) fn apply_first_page(&mut self, page: Page) -> Vec<u64> {
        self.total_reported = Some(page.reported_total);
        self.records.extend(page.records);
        self.pages_succeeded = 1;
        self.phase = Phase::Planning;

        let offsets = plan_offsets(page.reported_total, self.page_size);
        self.outstanding = offsets.iter().copied().collect();
        offsets
    }

    /// Returns false when the offset was not outstanding (duplicate or unplanned).
    pub(crate) fn take_outstanding(&mut self, offset: u64) -> bool {
        self.outstanding.remove(&offset)
    }

    /// Store a page whose offset was already taken off the outstanding set.
    pub(crate) fn apply_page(&mut self, page: Page) -> Option<HarvestWarning> {
        let first_total = self.total_reported.unwrap_or_default();
        let warning = (page.reported_total != first_total).then(|| HarvestWarning::TotalChanged {
            offset: page.offset,
            first_total,
            observed_total: page.reported_total,
        });
        if let Some(warning) = &warning {
            self.warnings.push(warning.clone());
        }
        self.records.extend(page.records);
        self.pages_succeeded += 1;
        warning
    }

    pub(crate) fn record_failure(&mut self, failure: PageFailure) {
        self.failures.push(failure);
    }

    pub(crate) fn cancel_outstanding(&mut self) {
        self.outstanding.clear();
    }
}
