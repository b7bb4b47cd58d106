//! Harvest engine: HTTP page fetching, retry, the bounded worker pool and
//! the signature-keyed result cache.
mod cache;
mod config;
mod fetch;
mod progress;
mod retry;
mod scheduler;
mod types;

pub use cache::{Clock, HarvestCache, SystemClock};
pub use config::EngineConfig;
pub use fetch::{
    FetchSettings, PageFetcher, ReqwestPageFetcher, DEFAULT_ENDPOINT, MAX_REPORTED_TOTAL,
};
pub use progress::{ChannelProgressSink, HarvestProgress, NoopProgress, ProgressCounter, ProgressSink};
pub use retry::{RetryExhausted, RetryPolicy, Sleeper, TokioSleeper};
pub use scheduler::{HarvestSettings, Harvester, MAX_CONCURRENCY};
pub use types::{FailureKind, HarvestError, HarvestResult, PageError};
