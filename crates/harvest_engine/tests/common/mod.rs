#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDate;
use harvest_core::{FailureMode, Page, Query, WinRecord};
use harvest_engine::{
    FailureKind, HarvestSettings, Harvester, PageError, PageFetcher, RetryPolicy, Sleeper,
};
use serde_json::json;

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn query() -> Query {
    Query::new(day(2024, 1, 1), day(2026, 1, 8), ["Quincy", "N Quincy"])
}

pub fn win(index: usize) -> WinRecord {
    WinRecord::from_value(json!({
        "date_of_win": "2025-01-02",
        "prize_amount_usd": 600 + index,
        "name": format!("win-{index}"),
        "retailer": "Corner Store",
        "retailer_location": "Quincy",
        "game": "Lucky 7s",
    }))
    .unwrap()
}

/// In-memory service: serves slices of a fixed dataset and fails chosen
/// offsets a given number of times.
pub struct ScriptedFetcher {
    records: Vec<WinRecord>,
    reported_total: i64,
    failures: Mutex<HashMap<u64, u32>>,
    calls: Mutex<Vec<u64>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedFetcher {
    pub fn new(total: usize) -> Self {
        Self::with_records((0..total).map(win).collect())
    }

    pub fn with_records(records: Vec<WinRecord>) -> Self {
        Self {
            reported_total: records.len() as i64,
            records,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Fail `offset` the next `times` requests; `u32::MAX` means always.
    pub fn fail(self, offset: u64, times: u32) -> Self {
        self.failures.lock().unwrap().insert(offset, times);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, offset: u64) -> usize {
        self.calls().iter().filter(|o| **o == offset).count()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn take_failure(&self, offset: u64) -> bool {
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&offset) {
            Some(0) | None => false,
            Some(&mut u32::MAX) => true,
            Some(remaining) => {
                *remaining -= 1;
                true
            }
        }
    }
}

#[async_trait::async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch(&self, _query: &Query, offset: u64, page_size: u64) -> Result<Page, PageError> {
        self.calls.lock().unwrap().push(offset);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.take_failure(offset) {
            return Err(PageError {
                kind: FailureKind::HttpStatus(503),
                offset,
                message: "HTTP 503 | unavailable".into(),
            });
        }

        let start = (offset as usize).min(self.records.len());
        let end = (start + page_size as usize).min(self.records.len());
        Ok(Page {
            offset,
            reported_total: self.reported_total,
            records: self.records[start..end].to_vec(),
        })
    }
}

/// Records requested delays and returns at once.
#[derive(Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.delays.lock().unwrap().push(delay);
        tokio::task::yield_now().await;
    }
}

pub fn harvester(
    fetcher: Arc<ScriptedFetcher>,
    page_size: u64,
    concurrency: usize,
    failure_mode: FailureMode,
) -> Harvester {
    let retry = RetryPolicy::new(3, Duration::from_millis(350))
        .with_sleeper(Arc::new(RecordingSleeper::default()));
    Harvester::new(
        fetcher,
        retry,
        HarvestSettings {
            page_size,
            concurrency,
            failure_mode,
            pacing: Duration::ZERO,
        },
    )
}
