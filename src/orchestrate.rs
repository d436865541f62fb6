use chrono::NaiveDate;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};
use tracing::{error, info};

use crate::collect::PageCollector;
use crate::confirm::DetailConfirmer;
use crate::discover::RangeDiscoverer;
use crate::domain::{Filters, SliceBatch, PAGE_LIMIT};
use crate::error::{CrawlError, CrawlResult};
use crate::retry::{BackoffRetrier, RetryBudget, DEFAULT_BACKOFF};
use crate::service::SearchService;

/// Knobs for one crawl, built from the command line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlConfig {
    pub retries: RetryBudget,
    /// Detail lookups get their own budget so a record whose details never
    /// come back is dropped instead of stalling the run.
    pub detail_retries: RetryBudget,
    pub backoff_ms: u64,
    pub workers: usize,
    pub confirm_details: bool,
    pub page_limit: u32,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            retries: RetryBudget::Unbounded,
            detail_retries: DEFAULT_DETAIL_RETRIES,
            backoff_ms: DEFAULT_BACKOFF.as_millis() as u64,
            workers: default_workers(),
            confirm_details: false,
            page_limit: PAGE_LIMIT,
        }
    }
}

pub const DEFAULT_DETAIL_RETRIES: RetryBudget = match NonZeroU32::new(3) {
    Some(n) => RetryBudget::Attempts(n),
    None => unreachable!(),
};

pub fn default_workers() -> usize {
    std::cmp::min(num_cpus::get(), 8)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub slices: usize,
    pub pages: u64,
    pub records: u64,
}

/// Walks a date range slice by slice. Slices run strictly in date order; the
/// pages of one slice are fetched concurrently.
pub struct SliceOrchestrator<'a, S: ?Sized> {
    service: &'a S,
    retrier: BackoffRetrier,
    detail_retrier: BackoffRetrier,
    pool: ThreadPool,
    config: CrawlConfig,
}

impl<'a, S: SearchService + ?Sized> SliceOrchestrator<'a, S> {
    pub fn new(service: &'a S, config: CrawlConfig) -> CrawlResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .thread_name(|i| format!("page-fetch-{i}"))
            .build()?;
        let backoff = Duration::from_millis(config.backoff_ms);
        let retrier = BackoffRetrier::new(config.retries, backoff);
        let detail_retrier = BackoffRetrier::new(config.detail_retries, backoff);

        info!(
            action = "configure",
            component = "slice_orchestrator",
            worker_count = pool.current_num_threads(),
            retries = %config.retries,
            detail_retries = %config.detail_retries,
            backoff_ms = config.backoff_ms,
            confirm_details = config.confirm_details,
            "Using workers for page collection"
        );

        Ok(Self {
            service,
            retrier,
            detail_retrier,
            pool,
            config,
        })
    }

    /// Hands every slice's batch to `sink` before starting the next slice.
    /// A fatal fetch error or a sink error stops the run.
    pub fn run<F, E>(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        filters: &Filters,
        mut sink: F,
    ) -> Result<RunSummary, E>
    where
        F: FnMut(SliceBatch) -> Result<(), E>,
        E: From<CrawlError>,
    {
        if end_date < start_date {
            return Err(CrawlError::InvalidRange {
                start: start_date,
                end: end_date,
            }
            .into());
        }

        let run_start = Instant::now();
        let mut summary = RunSummary::default();
        let mut cursor = start_date;

        loop {
            let batch = match self.fetch_slice(cursor, end_date, filters) {
                Ok(batch) => batch,
                Err(err) => {
                    error!(
                        action = "abort",
                        component = "slice_orchestrator",
                        resume_from = %cursor,
                        end_date = %end_date,
                        filters = %filters,
                        error = %err,
                        "Slice failed, rerun from resume_from to continue"
                    );
                    return Err(err.into());
                }
            };

            let slice = batch.slice;
            summary.slices += 1;
            summary.pages += u64::from(batch.page_count);
            summary.records += batch.records.len() as u64;

            info!(
                action = "complete",
                component = "slice_orchestrator",
                slice = %slice,
                page_count = batch.page_count,
                total_results = batch.total_results,
                record_count = batch.records.len(),
                "Slice fetched"
            );
            sink(batch)?;

            match slice.end_date.succ_opt() {
                Some(next) if next <= end_date => cursor = next,
                _ => break,
            }
        }

        info!(
            action = "complete",
            component = "slice_orchestrator",
            slices = summary.slices,
            pages = summary.pages,
            records = summary.records,
            duration_ms = run_start.elapsed().as_millis(),
            "Range fetched"
        );
        Ok(summary)
    }

    fn fetch_slice(
        &self,
        cursor: NaiveDate,
        end_date: NaiveDate,
        filters: &Filters,
    ) -> CrawlResult<SliceBatch> {
        let discovery = RangeDiscoverer::new(self.service, &self.retrier)
            .with_page_limit(self.config.page_limit)
            .discover(cursor, end_date, filters)?;

        let first = discovery.page;
        let slice = discovery.slice;
        let total_results = first.total_results;
        let page_count = first.total_pages;

        let mut records = first.records;
        if page_count > 1 {
            let rest = PageCollector::new(self.service, &self.retrier, &self.pool)
                .collect(&slice, page_count, filters)?;
            for page in rest {
                records.extend(page.records);
            }
        }

        if self.config.confirm_details {
            records = DetailConfirmer::new(self.service, &self.detail_retrier, &self.pool)
                .retain_confirmed(records, filters);
        }

        Ok(SliceBatch {
            slice,
            total_results,
            page_count,
            records,
        })
    }
}
