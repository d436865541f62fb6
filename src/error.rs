use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::Filters;

/// Failure of a single call against the search service. Always treated as
/// transient and retried by the caller's retry budget.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0}")]
    Transient(String),
}

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Could not complete request ({context}) after {attempts} attempts")]
    ExhaustedRetries {
        context: String,
        attempts: u32,
        #[source]
        source: ServiceError,
    },

    #[error(
        "Single-day range {date} still reports {total_pages} pages (limit {page_limit}) with {filters}"
    )]
    UnshrinkableRange {
        date: NaiveDate,
        total_pages: u32,
        page_limit: u32,
        filters: Filters,
    },

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("Could not confirm details for record {id}")]
    DetailConfirmation {
        id: u64,
        #[source]
        source: Box<CrawlError>,
    },

    #[error("Worker pool error: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

pub type CrawlResult<T> = Result<T, CrawlError>;
