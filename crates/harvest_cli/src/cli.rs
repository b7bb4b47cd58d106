use std::path::PathBuf;

use chrono::NaiveDate;
use clap::Parser;
use harvest_core::Query;
use harvest_logging::{LevelFilter, LogDestination};

#[derive(Debug, Parser)]
#[command(name = "harvest_cli")]
#[command(about = "Harvest every winner record for a date range and city filter")]
pub struct Args {
    /// First day of the range, inclusive.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub from: NaiveDate,

    /// Last day of the range, inclusive.
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub to: NaiveDate,

    /// Comma-separated city filter. Empty means all cities.
    #[arg(long, default_value = "")]
    pub cities: String,

    #[arg(long)]
    pub page_size: Option<u64>,

    /// Concurrent page requests (1-6).
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Keep going past pages that exhaust their retries.
    #[arg(long)]
    pub best_effort: bool,

    /// RON file with engine settings. Flags take precedence.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the harvest result as JSON to this file.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Also log to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

impl Args {
    pub fn query(&self) -> Query {
        Query::new(self.from, self.to, Query::parse_categories(&self.cities))
    }

    pub fn log_destination(&self) -> LogDestination {
        match &self.log_file {
            Some(path) => LogDestination::Both(path.clone()),
            None => LogDestination::Terminal,
        }
    }
}
