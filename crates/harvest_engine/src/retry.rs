use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use harvest_core::{Page, Query};
use harvest_logging::harvest_warn;
use tokio_util::sync::CancellationToken;

use crate::{PageError, PageFetcher};

/// Suspends a retrying task. Swapped out in tests to skip real delays.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Retry budget spent on one offset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("gave up after {attempts} attempts: {last}")]
pub struct RetryExhausted {
    pub attempts: u32,
    pub last: PageError,
}

/// Bounded retry with linear backoff: attempt `n` failing waits
/// `base_delay * n` before attempt `n + 1`. Every failure kind is retried.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(350))
    }
}

impl RetryPolicy {
    /// `max_attempts` counts the first try; zero is treated as one.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }

    /// Run `op` until it succeeds, the budget is spent, or `cancel` fires.
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, RetryExhausted>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, PageError>>,
    {
        let mut attempt = 1;
        loop {
            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if attempt >= self.max_attempts || cancel.is_cancelled() {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last: err,
                });
            }

            let delay = self.backoff(attempt);
            harvest_warn!(
                "offset {} attempt {}/{} failed ({}), retrying in {:?}",
                err.offset,
                attempt,
                self.max_attempts,
                err.kind,
                delay
            );
            if !self.pause(delay, cancel).await {
                return Err(RetryExhausted {
                    attempts: attempt,
                    last: err,
                });
            }
            attempt += 1;
        }
    }

    pub async fn fetch_with_retry(
        &self,
        fetcher: &dyn PageFetcher,
        query: &Query,
        offset: u64,
        page_size: u64,
        cancel: &CancellationToken,
    ) -> Result<Page, RetryExhausted> {
        self.run(cancel, |_| fetcher.fetch(query, offset, page_size))
            .await
    }

    /// Sleep unless cancelled first. Returns false on cancellation.
    pub(crate) async fn pause(&self, delay: Duration, cancel: &CancellationToken) -> bool {
        if delay.is_zero() {
            return !cancel.is_cancelled();
        }
        tokio::select! {
            _ = cancel.cancelled() => false,
            _ = self.sleeper.sleep(delay) => true,
        }
    }
}
