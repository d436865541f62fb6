use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Highest page count the search service reports reliably for one query.
pub const PAGE_LIMIT: u32 = 500;

/// Optional narrowing applied to every query of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filters {
    /// Minimum duration in minutes.
    pub min_duration: Option<u32>,
    /// Match records carrying at least one of these category IDs.
    pub one_of_category: Option<BTreeSet<u32>>,
}

impl Filters {
    pub fn is_empty(&self) -> bool {
        self.min_duration.is_none() && self.one_of_category.is_none()
    }

    /// Whether a record's confirmed details satisfy every filter that is set.
    ///
    /// An unknown duration never satisfies a minimum.
    pub fn matches(&self, duration: Option<u32>, categories: &[u32]) -> bool {
        if let Some(min) = self.min_duration {
            match duration {
                Some(d) if d >= min => {}
                _ => return false,
            }
        }

        if let Some(wanted) = &self.one_of_category {
            if !categories.iter().any(|c| wanted.contains(c)) {
                return false;
            }
        }

        true
    }
}

impl fmt::Display for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.min_duration {
            Some(min) => write!(f, "min_duration={min}")?,
            None => write!(f, "min_duration=None")?,
        }
        match &self.one_of_category {
            Some(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                write!(f, ", one_of_category=[{}]", ids.join(","))
            }
            None => write!(f, ", one_of_category=None"),
        }
    }
}

/// Inclusive date range, `start_date <= end_date`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSlice {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl DateSlice {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Option<Self> {
        (start_date <= end_date).then_some(Self {
            start_date,
            end_date,
        })
    }

    pub fn days(&self) -> i64 {
        (self.end_date - self.start_date).num_days() + 1
    }
}

impl fmt::Display for DateSlice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start_date, self.end_date)
    }
}

/// One request against the search service. Never mutated after it is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub filters: Filters,
    pub page: u32,
}

impl Query {
    pub fn first_page(start_date: NaiveDate, end_date: NaiveDate, filters: &Filters) -> Self {
        Self {
            start_date,
            end_date,
            filters: filters.clone(),
            page: 1,
        }
    }

    pub fn page_of(slice: &DateSlice, filters: &Filters, page: u32) -> Self {
        Self {
            start_date: slice.start_date,
            end_date: slice.end_date,
            filters: filters.clone(),
            page,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "start_date={}, end_date={}, {}, page={}",
            self.start_date, self.end_date, self.filters, self.page
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub release_date: NaiveDate,
    pub title: String,
    pub duration: Option<u32>,
    pub categories: Vec<u32>,
}

/// Result of a per-record detail lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailRecord {
    pub id: u64,
    pub duration: Option<u32>,
    pub categories: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPage {
    pub page_number: u32,
    /// Always at least 1.
    pub total_pages: u32,
    pub total_results: u64,
    pub records: Vec<Record>,
}

/// Every matched record of one slice, in page order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceBatch {
    pub slice: DateSlice,
    pub total_results: u64,
    pub page_count: u32,
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
    pub cumulative_sum: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoublingEntry {
    pub date: NaiveDate,
    pub days_until_doubling: i64,
    pub doubling_date: NaiveDate,
}
