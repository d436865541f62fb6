use anyhow::Result;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::args::AnalyzeArgs;
use crate::stats::{self, AnalysisResult};
use crate::utils::format_number;
use crate::{doubling, sqlite};

/// Recompute both aggregate tables from every stored record.
pub fn analyze_release_history(db_path: &Path) -> Result<AnalysisResult> {
    let total_start_time = Instant::now();
    info!(action = "start", component = "analysis", "Starting release history analysis");

    let mut conn = sqlite::open_store(db_path)?;
    let dates = sqlite::load_release_dates(&conn)?;

    let daily_counts = stats::aggregate(&dates);
    let doubling_dates = doubling::doubling_dates(&daily_counts);
    sqlite::write_daily_counts(&mut conn, &daily_counts, &doubling_dates)?;

    let doubling_series = doubling::compute(&daily_counts);
    sqlite::write_doubling_series(&mut conn, &doubling_series)?;

    let date_range = sqlite::get_date_range(&conn)?;

    info!(
        action = "complete",
        component = "analysis",
        duration_ms = total_start_time.elapsed().as_millis(),
        "Analysis completed successfully"
    );

    Ok(AnalysisResult {
        date_range,
        total_records: dates.len() as u64,
        daily_counts,
        doubling_series,
    })
}

pub fn print_analysis_results(result: &AnalysisResult, args: &AnalyzeArgs) {
    let (earliest_date, latest_date, days_between) = &result.date_range;

    println!("\n--- Release History Analysis ---");

    if *days_between > 0 {
        println!(
            "Date range: {} to {} ({} days)",
            earliest_date,
            latest_date,
            format_number(*days_between as u64)
        );
    } else {
        println!("Date range: {} to {}", earliest_date, latest_date);
    }

    println!("Total records: {}", format_number(result.total_records));
    println!(
        "Distinct release dates: {}",
        format_number(result.daily_counts.len() as u64)
    );
    println!(
        "Days with a doubling date: {}",
        format_number(result.doubling_series.len() as u64)
    );

    let skip = result.doubling_series.len().saturating_sub(args.tail);
    let tail = &result.doubling_series[skip..];
    if !tail.is_empty() {
        println!("\nLatest {} doubling entries:", tail.len());
        for entry in tail {
            println!(
                "- {}: doubled by {} ({} days, {:.2} years)",
                entry.date,
                entry.doubling_date,
                format_number(entry.days_until_doubling as u64),
                entry.days_until_doubling as f64 / 365.25
            );
        }
    }
}
