use rayon::prelude::*;
use rayon::ThreadPool;
use std::time::Instant;
use tracing::info;

use crate::domain::{DateSlice, Filters, Query, ResultPage};
use crate::error::CrawlResult;
use crate::retry::BackoffRetrier;
use crate::service::SearchService;

/// Fetches pages `2..=total_pages` of a slice on a bounded worker pool.
pub struct PageCollector<'a, S: ?Sized> {
    service: &'a S,
    retrier: &'a BackoffRetrier,
    pool: &'a ThreadPool,
}

impl<'a, S: SearchService + ?Sized> PageCollector<'a, S> {
    pub fn new(service: &'a S, retrier: &'a BackoffRetrier, pool: &'a ThreadPool) -> Self {
        Self {
            service,
            retrier,
            pool,
        }
    }

    /// Returns the pages sorted by page number. The first page whose retries
    /// run out fails the whole collection; fetches already in flight finish
    /// and their results are dropped.
    pub fn collect(
        &self,
        slice: &DateSlice,
        total_pages: u32,
        filters: &Filters,
    ) -> CrawlResult<Vec<ResultPage>> {
        if total_pages < 2 {
            return Ok(Vec::new());
        }

        let start_time = Instant::now();
        let mut pages = self.pool.install(|| {
            (2..=total_pages)
                .into_par_iter()
                .map(|page| {
                    let query = Query::page_of(slice, filters, page);
                    self.retrier
                        .call(self.service, &query, |s| s.search_page(&query))
                })
                .collect::<CrawlResult<Vec<ResultPage>>>()
        })?;

        pages.sort_by_key(|p| p.page_number);

        info!(
            action = "complete",
            component = "page_collector",
            slice = %slice,
            page_count = pages.len(),
            worker_count = self.pool.current_num_threads(),
            duration_ms = start_time.elapsed().as_millis(),
            "Collected remaining pages"
        );
        Ok(pages)
    }
}
