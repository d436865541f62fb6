use chrono::{Duration, NaiveDate};
use tracing::{debug, info, warn};

use crate::domain::{Filters, Query};
use crate::error::{CrawlError, CrawlResult};
use crate::retry::BackoffRetrier;
use crate::service::SearchService;

/// Earliest release date TMDb lists.
pub const CATALOGUE_START: NaiveDate = match NaiveDate::from_ymd_opt(1874, 12, 9) {
    Some(date) => date,
    None => unreachable!(),
};

/// Outcome of a single-date doubling lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoublingAt {
    pub date: NaiveDate,
    /// Records released before `date`.
    pub count_before: u64,
    /// First day by which as many records again had been released, if any.
    pub doubling_date: Option<NaiveDate>,
}

impl DoublingAt {
    pub fn days(&self) -> Option<i64> {
        self.doubling_date.map(|d| (d - self.date).num_days())
    }
}

/// Answers "when had the catalogue doubled relative to this date" from live
/// result counts, without crawling any records.
pub struct DoublingLookup<'a, S: ?Sized> {
    service: &'a S,
    retrier: &'a BackoffRetrier,
}

impl<'a, S: SearchService + ?Sized> DoublingLookup<'a, S> {
    pub fn new(service: &'a S, retrier: &'a BackoffRetrier) -> Self {
        Self { service, retrier }
    }

    /// Number of matching records released in `start..=end`.
    pub fn count_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        filters: &Filters,
    ) -> CrawlResult<u64> {
        let query = Query::first_page(start, end, filters);
        let page = self
            .retrier
            .call(self.service, &query, |s| s.search_first_page(&query))?;
        debug!(
            action = "count",
            component = "doubling_lookup",
            query = %query,
            total_results = page.total_results,
            "Counted records"
        );
        Ok(page.total_results)
    }

    /// `since` is the first day counted before `date`; `until` bounds the
    /// search for the doubling date.
    pub fn lookup(
        &self,
        date: NaiveDate,
        since: NaiveDate,
        until: NaiveDate,
        filters: &Filters,
    ) -> CrawlResult<DoublingAt> {
        let day_before = date
            .pred_opt()
            .filter(|d| *d >= since)
            .ok_or(CrawlError::InvalidRange {
                start: since,
                end: date,
            })?;
        if until < date {
            return Err(CrawlError::InvalidRange {
                start: date,
                end: until,
            });
        }

        let count_before = self.count_between(since, day_before, filters)?;
        let doubling_date = self.first_date_reaching(date, until, count_before, filters)?;

        match doubling_date {
            Some(doubling_date) => info!(
                action = "complete",
                component = "doubling_lookup",
                date = %date,
                count_before,
                doubling_date = %doubling_date,
                "Doubling date found"
            ),
            None => warn!(
                action = "complete",
                component = "doubling_lookup",
                date = %date,
                count_before,
                until = %until,
                "Catalogue has not doubled yet"
            ),
        }

        Ok(DoublingAt {
            date,
            count_before,
            doubling_date,
        })
    }

    /// Smallest `end` in `start..=until` with at least `target` records in
    /// `start..=end`. Counts never shrink as `end` grows, so this bisects.
    fn first_date_reaching(
        &self,
        start: NaiveDate,
        until: NaiveDate,
        target: u64,
        filters: &Filters,
    ) -> CrawlResult<Option<NaiveDate>> {
        if self.count_between(start, until, filters)? < target {
            return Ok(None);
        }

        let (mut low, mut high) = (start, until);
        while low < high {
            let mid = low + Duration::days((high - low).num_days() / 2);
            if self.count_between(start, mid, filters)? >= target {
                high = mid;
            } else {
                low = mid + Duration::days(1);
            }
        }
        Ok(Some(low))
    }
}
