use chrono::{Duration, NaiveDate};
use tracing::debug;

use crate::domain::{DateSlice, Filters, Query, ResultPage, PAGE_LIMIT};
use crate::error::{CrawlError, CrawlResult};
use crate::retry::BackoffRetrier;
use crate::service::SearchService;

/// First page of a slice whose page count fits under the ceiling.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub page: ResultPage,
    pub slice: DateSlice,
}

/// Finds the longest prefix of a date range, reached by repeated halving,
/// whose first page reports no more than `page_limit` pages.
pub struct RangeDiscoverer<'a, S: ?Sized> {
    service: &'a S,
    retrier: &'a BackoffRetrier,
    page_limit: u32,
}

impl<'a, S: SearchService + ?Sized> RangeDiscoverer<'a, S> {
    pub fn new(service: &'a S, retrier: &'a BackoffRetrier) -> Self {
        Self {
            service,
            retrier,
            page_limit: PAGE_LIMIT,
        }
    }

    pub fn with_page_limit(mut self, page_limit: u32) -> Self {
        self.page_limit = page_limit;
        self
    }

    pub fn discover(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        filters: &Filters,
    ) -> CrawlResult<Discovery> {
        if end_date < start_date {
            return Err(CrawlError::InvalidRange {
                start: start_date,
                end: end_date,
            });
        }

        let mut end_date = end_date;
        let mut page = self.first_page(start_date, end_date, filters)?;

        while page.total_pages > self.page_limit {
            let span = (end_date - start_date).num_days();
            if span == 0 {
                return Err(CrawlError::UnshrinkableRange {
                    date: start_date,
                    total_pages: page.total_pages,
                    page_limit: self.page_limit,
                    filters: filters.clone(),
                });
            }

            end_date = start_date + Duration::days(span / 2);
            debug!(
                action = "bisect",
                component = "range_discoverer",
                start_date = %start_date,
                end_date = %end_date,
                total_pages = page.total_pages,
                "Too many pages, halving range"
            );
            page = self.first_page(start_date, end_date, filters)?;
        }

        Ok(Discovery {
            page,
            slice: DateSlice {
                start_date,
                end_date,
            },
        })
    }

    fn first_page(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
        filters: &Filters,
    ) -> CrawlResult<ResultPage> {
        let query = Query::first_page(start_date, end_date, filters);
        self.retrier
            .call(self.service, &query, |s| s.search_first_page(&query))
    }
}
