pub mod analysis;
pub mod args;
pub mod collect;
pub mod confirm;
pub mod discover;
pub mod domain;
pub mod doubling;
pub mod error;
pub mod fetch;
pub mod lookup;
pub mod orchestrate;
pub mod retry;
pub mod service;
pub mod sqlite;
pub mod stats;
pub mod tmdb;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use args::Args;
pub use collect::PageCollector;
pub use confirm::DetailConfirmer;
pub use discover::{Discovery, RangeDiscoverer};
pub use domain::{
    DailyCount, DateSlice, DetailRecord, DoublingEntry, Filters, Query, Record, ResultPage,
    SliceBatch, PAGE_LIMIT,
};
pub use error::{CrawlError, CrawlResult, ServiceError};
pub use lookup::{DoublingAt, DoublingLookup};
pub use orchestrate::{CrawlConfig, RunSummary, SliceOrchestrator};
pub use retry::{BackoffRetrier, RetryBudget};
pub use service::SearchService;
pub use stats::AnalysisResult;
pub use tmdb::TmdbClient;
