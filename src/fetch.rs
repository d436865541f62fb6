use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::info;

use crate::args::{DoublingAtArgs, FetchArgs};
use crate::lookup::{DoublingAt, DoublingLookup};
use crate::orchestrate::{RunSummary, SliceOrchestrator};
use crate::retry::BackoffRetrier;
use crate::sqlite;
use crate::tmdb::TmdbClient;
use crate::utils::format_number;

#[derive(Debug)]
pub struct FetchResult {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub summary: RunSummary,
}

pub fn fetch_release_dates(args: &FetchArgs, db_path: &Path) -> Result<FetchResult> {
    let total_start_time = Instant::now();
    let end_date = args.end.unwrap_or_else(|| Local::now().date_naive());
    let filters = args.filters();
    let config = args.crawl_config();

    info!(
        action = "start",
        component = "fetch",
        start_date = %args.start,
        end_date = %end_date,
        filters = %filters,
        "Starting release date fetch"
    );

    let client = TmdbClient::new(args.api_key.as_str())
        .context("Failed to create HTTP client")?
        .with_region(args.region.as_str())
        .with_cache(args.cache);
    let mut conn = sqlite::open_store(db_path)?;

    let orchestrator = SliceOrchestrator::new(&client, config)?;
    let summary = orchestrator.run(args.start, end_date, &filters, |batch| {
        sqlite::write_slice_batch(&mut conn, &batch)
    })?;

    info!(
        action = "complete",
        component = "fetch",
        duration_ms = total_start_time.elapsed().as_millis(),
        "Fetch completed successfully"
    );

    Ok(FetchResult {
        start_date: args.start,
        end_date,
        summary,
    })
}

pub fn print_fetch_results(result: &FetchResult) {
    println!("\n--- Release Date Fetch ---");
    println!("Date range: {} to {}", result.start_date, result.end_date);
    println!("Slices: {}", format_number(result.summary.slices as u64));
    println!("Pages: {}", format_number(result.summary.pages));
    println!("Records stored: {}", format_number(result.summary.records));
}

pub fn fetch_doubling_at(args: &DoublingAtArgs) -> Result<DoublingAt> {
    let start_time = Instant::now();
    let until = args.until.unwrap_or_else(|| Local::now().date_naive());
    let filters = args.filters();

    info!(
        action = "start",
        component = "doubling_at",
        date = %args.date,
        since = %args.since,
        until = %until,
        filters = %filters,
        "Looking up doubling date"
    );

    let client = TmdbClient::new(args.api_key.as_str())
        .context("Failed to create HTTP client")?
        .with_region(args.region.as_str());
    let retrier = BackoffRetrier::new(args.retries, Duration::from_millis(args.backoff_ms));

    let result =
        DoublingLookup::new(&client, &retrier).lookup(args.date, args.since, until, &filters)?;

    info!(
        action = "complete",
        component = "doubling_at",
        duration_ms = start_time.elapsed().as_millis(),
        "Doubling lookup completed"
    );
    Ok(result)
}

pub fn print_doubling_at(result: &DoublingAt) {
    println!("\n--- Doubling At {} ---", result.date);
    println!("Records before: {}", format_number(result.count_before));
    match (result.doubling_date, result.days()) {
        (Some(doubling_date), Some(days)) => {
            println!("Doubled by: {}", doubling_date);
            println!(
                "Days until doubling: {} ({:.2} years)",
                format_number(days as u64),
                days as f64 / 365.25
            );
        }
        _ => println!("Not doubled yet"),
    }
}
