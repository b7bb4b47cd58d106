mod cli;
mod config;
mod output;
mod progress;

use anyhow::Result;
use clap::Parser;
use harvest_core::HarvestSummary;
use harvest_engine::HarvestResult;
use harvest_logging::{harvest_info, harvest_warn};

use crate::cli::Args;
use crate::progress::TerminalProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    harvest_logging::initialize(args.log_destination(), args.log_level);

    let config = config::resolve(&args)?;
    let query = args.query();
    query.validate()?;

    let cache = config.build_cache()?;
    let progress = TerminalProgress::new();
    let result = cache
        .get_or_harvest(&query, config.cache_ttl(), &progress)
        .await;
    progress.finish();
    let result = result?;

    print_report(&result);

    if !result.is_complete() {
        harvest_warn!(
            "{} offsets could not be fetched; the record set is partial",
            result.failed_offsets.len()
        );
    }

    if let Some(path) = &args.output {
        let written = output::write_result(path, &result)?;
        harvest_info!("Wrote {} records to {:?}", result.records.len(), written);
    }

    Ok(())
}

fn print_report(result: &HarvestResult) {
    let summary = HarvestSummary::from_records(&result.records);
    println!("query        {}", result.signature.short());
    println!(
        "records      {} (reported {}, {} duplicates removed, {} pages)",
        summary.wins, result.total_reported, result.duplicates_removed, result.pages_fetched
    );
    println!("total payout ${:.2}", summary.total_payout);
    match summary.median_payout {
        Some(median) => println!("median prize ${median:.2}"),
        None => println!("median prize -"),
    }
    println!("retailers    {}", summary.unique_retailers);
    println!("cities       {}", summary.unique_cities);
    match (summary.first_win, summary.last_win) {
        (Some(first), Some(last)) => println!("date range   {first} .. {last}"),
        _ => println!("date range   -"),
    }
    for warning in &result.warnings {
        println!("warning      {warning:?}");
    }
    for failure in &result.failed_offsets {
        println!(
            "failed       offset {} after {} attempts: {}",
            failure.offset, failure.attempts, failure.reason
        );
    }
}
