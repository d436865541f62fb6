use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::domain::{Filters, PAGE_LIMIT};
use crate::lookup::CATALOGUE_START;
use crate::orchestrate::{default_workers, CrawlConfig};
use crate::retry::RetryBudget;

#[derive(Parser, Debug)]
#[command(
    name = "releasedates",
    about = "Fetch every release date in a range from TMDb and compute how long the catalogue takes to double",
    version,
    long_about = None
)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the SQLite store
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fetch all matching records between two release dates
    Fetch(FetchArgs),
    /// Recompute daily counts and doubling dates from the store
    Analyze(AnalyzeArgs),
    /// Ask TMDb directly when the catalogue doubled relative to one date
    DoublingAt(DoublingAtArgs),
}

#[derive(clap::Args, Debug)]
pub struct FetchArgs {
    /// First release date to fetch (YYYY-MM-DD)
    #[arg(long)]
    pub start: NaiveDate,

    /// Last release date to fetch, inclusive (defaults to today)
    #[arg(long)]
    pub end: Option<NaiveDate>,

    /// Minimum runtime in minutes
    #[arg(long)]
    pub min_runtime: Option<u32>,

    /// Genre ID to match; repeat for "any of"
    #[arg(short, long = "genre")]
    pub genres: Vec<u32>,

    /// Attempts per request, or "unbounded"
    #[arg(short, long, default_value = "unbounded")]
    pub retries: RetryBudget,

    /// Attempts per detail lookup before the record is dropped
    #[arg(long, default_value = "3")]
    pub detail_retries: RetryBudget,

    /// Number of worker threads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Wait between attempts in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub backoff_ms: u64,

    /// Look up each record's details to confirm runtime and genres
    #[arg(long)]
    pub confirm_details: bool,

    /// Release region
    #[arg(long, default_value = "US")]
    pub region: String,

    /// Cache responses in memory
    #[arg(long)]
    pub cache: bool,

    /// TMDb API key
    #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
    pub api_key: String,
}

impl FetchArgs {
    pub fn filters(&self) -> Filters {
        genre_filters(self.min_runtime, &self.genres)
    }

    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            retries: self.retries,
            detail_retries: self.detail_retries,
            backoff_ms: self.backoff_ms,
            workers: self.workers.unwrap_or_else(default_workers),
            confirm_details: self.confirm_details,
            page_limit: PAGE_LIMIT,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct AnalyzeArgs {
    /// Number of most recent doubling entries to display
    #[arg(short, long, default_value_t = 10)]
    pub tail: usize,
}

#[derive(clap::Args, Debug)]
pub struct DoublingAtArgs {
    /// Date whose earlier catalogue should be doubled (YYYY-MM-DD)
    #[arg(long)]
    pub date: NaiveDate,

    /// First release date counted before --date
    #[arg(long, default_value_t = CATALOGUE_START)]
    pub since: NaiveDate,

    /// Latest doubling date to consider (defaults to today)
    #[arg(long)]
    pub until: Option<NaiveDate>,

    /// Minimum runtime in minutes
    #[arg(long)]
    pub min_runtime: Option<u32>,

    /// Genre ID to match; repeat for "any of"
    #[arg(short, long = "genre")]
    pub genres: Vec<u32>,

    /// Attempts per request, or "unbounded"
    #[arg(short, long, default_value = "unbounded")]
    pub retries: RetryBudget,

    /// Wait between attempts in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub backoff_ms: u64,

    /// Release region
    #[arg(long, default_value = "US")]
    pub region: String,

    /// TMDb API key
    #[arg(long, env = "TMDB_API_KEY", hide_env_values = true)]
    pub api_key: String,
}

impl DoublingAtArgs {
    pub fn filters(&self) -> Filters {
        genre_filters(self.min_runtime, &self.genres)
    }
}

fn genre_filters(min_runtime: Option<u32>, genres: &[u32]) -> Filters {
    Filters {
        min_duration: min_runtime,
        one_of_category: (!genres.is_empty())
            .then(|| genres.iter().copied().collect::<BTreeSet<u32>>()),
    }
}
