use chrono::NaiveDate;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::time::Instant;
use tracing::info;

use crate::domain::{DailyCount, DoublingEntry, Record};

/// Outcome of an `analyze` run.
#[derive(Debug)]
pub struct AnalysisResult {
    pub date_range: (String, String, i64),
    pub total_records: u64,
    pub daily_counts: Vec<DailyCount>,
    pub doubling_series: Vec<DoublingEntry>,
}

/// Per-day counts sorted by date, with an inclusive running total.
pub fn aggregate(dates: &[NaiveDate]) -> Vec<DailyCount> {
    let start_time = Instant::now();

    // Use Rayon's built-in parallel iterator with automatic work-stealing
    let date_counts: HashMap<NaiveDate, u64> = dates
        .par_iter()
        .fold(HashMap::new, |mut acc, date| {
            *acc.entry(*date).or_insert(0) += 1;
            acc
        })
        .reduce(HashMap::new, |mut merged, part| {
            for (date, count) in part {
                *merged.entry(date).or_insert(0) += count;
            }
            merged
        });

    let sorted: BTreeMap<NaiveDate, u64> = date_counts.into_iter().collect();
    let mut cumulative_sum = 0u64;
    let daily_counts: Vec<DailyCount> = sorted
        .into_iter()
        .map(|(date, count)| {
            cumulative_sum += count;
            DailyCount {
                date,
                count,
                cumulative_sum,
            }
        })
        .collect();

    info!(
        action = "complete",
        component = "daily_counter",
        record_count = dates.len(),
        distinct_dates = daily_counts.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Counted records per day"
    );
    daily_counts
}

pub fn aggregate_records(records: &[Record]) -> Vec<DailyCount> {
    let dates: Vec<NaiveDate> = records.iter().map(|r| r.release_date).collect();
    aggregate(&dates)
}
