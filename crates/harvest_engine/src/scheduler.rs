use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use harvest_core::{
    dedupe, update, FailureMode, HarvestEffect, HarvestMsg, HarvestState, Page, PageFailure,
    Phase, Query,
};
use harvest_logging::{harvest_debug, harvest_error, harvest_info, harvest_warn};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{
    HarvestError, HarvestProgress, HarvestResult, PageError, PageFetcher, ProgressSink,
    RetryExhausted, RetryPolicy,
};

pub const MAX_CONCURRENCY: usize = 6;

#[derive(Debug, Clone)]
pub struct HarvestSettings {
    pub page_size: u64,
    /// Worker pool size, clamped to `1..=MAX_CONCURRENCY`.
    pub concurrency: usize,
    pub failure_mode: FailureMode,
    /// Pause a worker takes after each page before claiming the next offset.
    pub pacing: Duration,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            page_size: 200,
            concurrency: 4,
            failure_mode: FailureMode::Abort,
            pacing: Duration::from_millis(20),
        }
    }
}

/// Runs one harvest: page 0 up front, the rest across a bounded worker pool.
#[derive(Clone)]
pub struct Harvester {
    fetcher: Arc<dyn PageFetcher>,
    retry: RetryPolicy,
    settings: HarvestSettings,
}

impl Harvester {
    pub fn new(fetcher: Arc<dyn PageFetcher>, retry: RetryPolicy, settings: HarvestSettings) -> Self {
        let settings = HarvestSettings {
            page_size: settings.page_size.max(1),
            concurrency: settings.concurrency.clamp(1, MAX_CONCURRENCY),
            ..settings
        };
        Self {
            fetcher,
            retry,
            settings,
        }
    }

    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    pub async fn harvest(
        &self,
        query: &Query,
        sink: &dyn ProgressSink,
    ) -> Result<HarvestResult, HarvestError> {
        query.validate()?;
        let signature = query.signature();
        let page_size = self.settings.page_size;
        harvest_info!(
            "harvest {} start: {}..{} categories={:?} page_size={} workers={} mode={:?}",
            signature.short(),
            query.date_from(),
            query.date_to(),
            query.categories(),
            page_size,
            self.settings.concurrency,
            self.settings.failure_mode
        );

        let mut state = HarvestState::new(page_size, self.settings.failure_mode);
        let mut pending = VecDeque::from([HarvestMsg::Start]);
        let mut pool: Option<WorkerPool> = None;
        let mut last_errors: HashMap<u64, RetryExhausted> = HashMap::new();

        loop {
            let msg = match pending.pop_front() {
                Some(msg) => msg,
                None => match pool.as_mut() {
                    Some(pool) => match pool.next().await {
                        Some(report) => report_to_msg(report, &mut last_errors),
                        None => break,
                    },
                    None => break,
                },
            };

            let (next, effects) = update(state, msg);
            state = next;

            for effect in effects {
                match effect {
                    HarvestEffect::FetchFirst => {
                        let result = self
                            .retry
                            .fetch_with_retry(
                                self.fetcher.as_ref(),
                                query,
                                0,
                                page_size,
                                &CancellationToken::new(),
                            )
                            .await;
                        pending.push_back(report_to_msg(
                            WorkerReport { offset: 0, result },
                            &mut last_errors,
                        ));
                    }
                    HarvestEffect::Dispatch { offsets } => {
                        harvest_info!(
                            "harvest {}: total {} reported, dispatching {} offsets",
                            signature.short(),
                            state.total_reported().unwrap_or_default(),
                            offsets.len()
                        );
                        pool = Some(WorkerPool::spawn(self, query, offsets));
                        pending.push_back(HarvestMsg::Dispatched);
                    }
                    HarvestEffect::StopDispatch => {
                        if let Some(pool) = &pool {
                            pool.stop();
                        }
                    }
                    HarvestEffect::Progress { fetched, total } => {
                        sink.emit(HarvestProgress { fetched, total });
                    }
                    HarvestEffect::Warn(warning) => {
                        harvest_warn!("harvest {}: {:?}", signature.short(), warning);
                    }
                    HarvestEffect::Completed => {
                        harvest_debug!(
                            "harvest {}: all pages collected ({} pages)",
                            signature.short(),
                            state.pages_succeeded()
                        );
                    }
                    HarvestEffect::Aborted(failure) => {
                        harvest_error!(
                            "harvest {} aborted at offset {} after {} attempts: {}",
                            signature.short(),
                            failure.offset,
                            failure.attempts,
                            failure.reason
                        );
                    }
                }
            }

            if state.phase().is_terminal() && pending.is_empty() {
                break;
            }
        }

        if let Some(pool) = pool {
            pool.shutdown().await;
        }

        if state.phase() == Phase::Aborted {
            return Err(abort_error(&state, &mut last_errors));
        }

        let Some(collected) = state.into_collected() else {
            // Every worker exited without reporting its offsets; only a
            // panicked worker can do that.
            return Err(HarvestError::Interrupted("worker pool ended early".into()));
        };

        let raw_count = collected.records.len();
        let records = dedupe(collected.records);
        let duplicates_removed = raw_count - records.len();
        harvest_info!(
            "harvest {} complete: {} records ({} duplicates removed), total reported {}, {} failed offsets",
            signature.short(),
            records.len(),
            duplicates_removed,
            collected.total_reported,
            collected.failures.len()
        );

        Ok(HarvestResult {
            signature,
            records,
            fetched_at: Utc::now(),
            total_reported: collected.total_reported,
            pages_fetched: collected.pages_succeeded,
            duplicates_removed,
            failed_offsets: collected.failures,
            warnings: collected.warnings,
        })
    }
}

struct WorkerReport {
    offset: u64,
    result: Result<Page, RetryExhausted>,
}

fn report_to_msg(report: WorkerReport, last_errors: &mut HashMap<u64, RetryExhausted>) -> HarvestMsg {
    match report.result {
        Ok(page) => HarvestMsg::PageFetched(page),
        Err(exhausted) => {
            let failure = PageFailure {
                offset: report.offset,
                attempts: exhausted.attempts,
                reason: exhausted.last.to_string(),
            };
            last_errors.insert(report.offset, exhausted);
            HarvestMsg::PageFailed(failure)
        }
    }
}

fn abort_error(state: &HarvestState, last_errors: &mut HashMap<u64, RetryExhausted>) -> HarvestError {
    let Some(failure) = state.abort_reason() else {
        return HarvestError::Interrupted("aborted without a recorded failure".into());
    };
    let (attempts, last) = match last_errors.remove(&failure.offset) {
        Some(exhausted) => (exhausted.attempts, exhausted.last),
        None => (
            failure.attempts,
            PageError::new(
                crate::FailureKind::Transport,
                failure.offset,
                failure.reason.clone(),
            ),
        ),
    };
    HarvestError::ExhaustedRetries {
        offset: failure.offset,
        attempts,
        pages_succeeded: state.pages_succeeded(),
        last,
    }
}

/// Fixed-size pool draining a shared queue of offsets. Cancelling stops
/// workers from claiming new offsets; fetches already running finish.
struct WorkerPool {
    cancel: CancellationToken,
    reports: mpsc::UnboundedReceiver<WorkerReport>,
    workers: JoinSet<()>,
}

impl WorkerPool {
    fn spawn(harvester: &Harvester, query: &Query, offsets: Vec<u64>) -> Self {
        let cancel = CancellationToken::new();
        let (tx, reports) = mpsc::unbounded_channel();
        let worker_count = harvester.settings.concurrency.min(offsets.len());
        let queue = Arc::new(Mutex::new(VecDeque::from(offsets)));
        let mut workers = JoinSet::new();

        for worker_id in 0..worker_count {
            let worker = Worker {
                id: worker_id,
                fetcher: Arc::clone(&harvester.fetcher),
                retry: harvester.retry.clone(),
                query: query.clone(),
                page_size: harvester.settings.page_size,
                pacing: harvester.settings.pacing,
                abort_on_failure: harvester.settings.failure_mode == FailureMode::Abort,
                queue: Arc::clone(&queue),
                cancel: cancel.clone(),
                tx: tx.clone(),
            };
            workers.spawn(worker.run());
        }

        Self {
            cancel,
            reports,
            workers,
        }
    }

    /// Next report in completion order; `None` once every worker has exited.
    async fn next(&mut self) -> Option<WorkerReport> {
        self.reports.recv().await
    }

    fn stop(&self) {
        self.cancel.cancel();
    }

    async fn shutdown(mut self) {
        self.cancel.cancel();
        self.reports.close();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(err) = joined {
                harvest_error!("harvest worker failed: {}", err);
            }
        }
    }
}

struct Worker {
    id: usize,
    fetcher: Arc<dyn PageFetcher>,
    retry: RetryPolicy,
    query: Query,
    page_size: u64,
    pacing: Duration,
    abort_on_failure: bool,
    queue: Arc<Mutex<VecDeque<u64>>>,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<WorkerReport>,
}

impl Worker {
    async fn run(self) {
        let mut pages = 0usize;
        while let Some(offset) = self.claim() {
            let result = self
                .retry
                .fetch_with_retry(
                    self.fetcher.as_ref(),
                    &self.query,
                    offset,
                    self.page_size,
                    &self.cancel,
                )
                .await;
            let exhausted = result.is_err();
            if self.tx.send(WorkerReport { offset, result }).is_err() {
                break;
            }
            if exhausted && self.abort_on_failure {
                // Stop claiming before the scheduler gets round to the report.
                self.cancel.cancel();
            }
            pages += 1;
            if !self.retry.pause(self.pacing, &self.cancel).await {
                break;
            }
        }
        harvest_debug!("worker {} done after {} pages", self.id, pages);
    }

    fn claim(&self) -> Option<u64> {
        if self.cancel.is_cancelled() {
            return None;
        }
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }
}
