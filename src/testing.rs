//! In-memory search service used by the unit tests.

use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::domain::{DetailRecord, Query, Record, ResultPage};
use crate::error::ServiceError;
use crate::service::SearchService;

pub(crate) fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// `per_day` lists `(days after start, number of records)`.
pub(crate) fn records_per_day(start: NaiveDate, per_day: &[(i64, usize)]) -> Vec<Record> {
    let mut records = Vec::new();
    for &(offset, count) in per_day {
        let release_date = start + Duration::days(offset);
        for _ in 0..count {
            let id = records.len() as u64 + 1;
            records.push(Record {
                id,
                release_date,
                title: format!("Record {id}"),
                duration: None,
                categories: Vec::new(),
            });
        }
    }
    records
}

pub(crate) struct FakeService {
    records: Vec<Record>,
    page_size: usize,
    page_failures: Mutex<HashMap<u32, u32>>,
    details: HashMap<u64, DetailRecord>,
    detail_failures: Mutex<HashMap<u64, u32>>,
    invalidations: AtomicUsize,
    calls: Mutex<Vec<Query>>,
}

impl FakeService {
    pub(crate) fn new(mut records: Vec<Record>, page_size: usize) -> Self {
        records.sort_by_key(|r| (r.release_date, r.id));
        Self {
            records,
            page_size,
            page_failures: Mutex::new(HashMap::new()),
            details: HashMap::new(),
            detail_failures: Mutex::new(HashMap::new()),
            invalidations: AtomicUsize::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Make every request for `page` fail `times` times before succeeding.
    pub(crate) fn fail_page(self, page: u32, times: u32) -> Self {
        self.page_failures.lock().unwrap().insert(page, times);
        self
    }

    pub(crate) fn with_details(mut self, details: Vec<DetailRecord>) -> Self {
        self.details = details.into_iter().map(|d| (d.id, d)).collect();
        self
    }

    pub(crate) fn fail_details(self, id: u64, times: u32) -> Self {
        self.detail_failures.lock().unwrap().insert(id, times);
        self
    }

    pub(crate) fn invalidations(&self) -> usize {
        self.invalidations.load(Ordering::SeqCst)
    }

    pub(crate) fn calls(&self) -> Vec<Query> {
        self.calls.lock().unwrap().clone()
    }

    fn take_failure<K: std::hash::Hash + Eq>(failures: &Mutex<HashMap<K, u32>>, key: K) -> bool {
        let mut failures = failures.lock().unwrap();
        match failures.get_mut(&key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }
}

impl SearchService for FakeService {
    fn search_page(&self, query: &Query) -> Result<ResultPage, ServiceError> {
        self.calls.lock().unwrap().push(query.clone());

        if Self::take_failure(&self.page_failures, query.page) {
            return Err(ServiceError::Transient(format!(
                "scripted failure for page {}",
                query.page
            )));
        }

        let matching: Vec<&Record> = self
            .records
            .iter()
            .filter(|r| r.release_date >= query.start_date && r.release_date <= query.end_date)
            .collect();
        let total_results = matching.len() as u64;
        let total_pages = matching.len().div_ceil(self.page_size).max(1) as u32;
        let skip = (query.page as usize - 1) * self.page_size;
        let records = matching
            .into_iter()
            .skip(skip)
            .take(self.page_size)
            .cloned()
            .collect();

        Ok(ResultPage {
            page_number: query.page,
            total_pages,
            total_results,
            records,
        })
    }

    fn invalidate_cache(&self) {
        self.invalidations.fetch_add(1, Ordering::SeqCst);
    }

    fn fetch_record_details(&self, id: u64) -> Result<DetailRecord, ServiceError> {
        if Self::take_failure(&self.detail_failures, id) {
            return Err(ServiceError::Transient(format!("scripted failure for {id}")));
        }
        self.details
            .get(&id)
            .cloned()
            .ok_or_else(|| ServiceError::Transient(format!("no details for {id}")))
    }
}
