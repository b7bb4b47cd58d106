use std::sync::Arc;
use std::time::Duration;

use harvest_core::FailureMode;
use serde::{Deserialize, Serialize};

use crate::fetch::DEFAULT_ENDPOINT;
use crate::{
    FetchSettings, HarvestCache, HarvestError, HarvestSettings, Harvester, ReqwestPageFetcher,
    RetryPolicy,
};

/// Engine-wide settings, loadable from a config file. Missing keys take
/// their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub endpoint: String,
    pub sort: Option<String>,
    pub page_size: u64,
    pub concurrency: usize,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub pacing_ms: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub cache_ttl_secs: u64,
    pub failure_mode: FailureMode,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            sort: Some("newestFirst".to_string()),
            page_size: 200,
            concurrency: 4,
            max_attempts: 3,
            retry_base_delay_ms: 350,
            pacing_ms: 20,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            cache_ttl_secs: 15 * 60,
            failure_mode: FailureMode::Abort,
        }
    }
}

impl EngineConfig {
    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            endpoint: self.endpoint.clone(),
            sort: self.sort.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            ..FetchSettings::default()
        }
    }

    pub fn harvest_settings(&self) -> HarvestSettings {
        HarvestSettings {
            page_size: self.page_size,
            concurrency: self.concurrency,
            failure_mode: self.failure_mode,
            pacing: Duration::from_millis(self.pacing_ms),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// HTTP harvester wired from this config.
    pub fn build_harvester(&self) -> Result<Harvester, HarvestError> {
        let fetcher = ReqwestPageFetcher::new(self.fetch_settings())?;
        Ok(Harvester::new(
            Arc::new(fetcher),
            self.retry_policy(),
            self.harvest_settings(),
        ))
    }

    pub fn build_cache(&self) -> Result<HarvestCache, HarvestError> {
        Ok(HarvestCache::new(self.build_harvester()?))
    }
}
