use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use harvest_core::FailureMode;
use harvest_engine::EngineConfig;
use harvest_logging::harvest_info;

use crate::cli::Args;

/// Engine config from the optional file, with command-line flags on top.
pub fn resolve(args: &Args) -> Result<EngineConfig> {
    let base = match &args.config {
        Some(path) => load(path)?,
        None => EngineConfig::default(),
    };
    Ok(apply_flags(base, args))
}

pub fn load(path: &Path) -> Result<EngineConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: EngineConfig = ron::from_str(&content)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    harvest_info!("Loaded engine config from {:?}", path);
    Ok(config)
}

fn apply_flags(mut config: EngineConfig, args: &Args) -> EngineConfig {
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if args.best_effort {
        config.failure_mode = FailureMode::BestEffort;
    }
    config
}
