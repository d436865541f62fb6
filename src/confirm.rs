use rayon::prelude::*;
use rayon::ThreadPool;
use std::fmt;
use tracing::{info, warn};

use crate::domain::{Filters, Record};
use crate::error::CrawlError;
use crate::retry::BackoffRetrier;
use crate::service::SearchService;

struct DetailLookup<'a> {
    id: u64,
    filters: &'a Filters,
}

impl fmt::Display for DetailLookup<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record_id={}, {}", self.id, self.filters)
    }
}

/// Re-checks each record's duration and categories against its detail
/// record, for when the search index filters imprecisely.
pub struct DetailConfirmer<'a, S: ?Sized> {
    service: &'a S,
    retrier: &'a BackoffRetrier,
    pool: &'a ThreadPool,
}

impl<'a, S: SearchService + ?Sized> DetailConfirmer<'a, S> {
    pub fn new(service: &'a S, retrier: &'a BackoffRetrier, pool: &'a ThreadPool) -> Self {
        Self {
            service,
            retrier,
            pool,
        }
    }

    /// Keeps the records whose details could be fetched and match `filters`,
    /// preserving their order. With no filters set nothing is looked up.
    pub fn retain_confirmed(&self, records: Vec<Record>, filters: &Filters) -> Vec<Record> {
        if filters.is_empty() {
            return records;
        }

        let candidates = records.len();
        let kept: Vec<Record> = self.pool.install(|| {
            records
                .into_par_iter()
                .filter(|record| self.confirm(record.id, filters))
                .collect()
        });

        info!(
            action = "complete",
            component = "detail_confirmer",
            candidates,
            confirmed = kept.len(),
            "Confirmed record details"
        );
        kept
    }

    fn confirm(&self, id: u64, filters: &Filters) -> bool {
        let lookup = DetailLookup { id, filters };
        match self
            .retrier
            .call(self.service, &lookup, |s| s.fetch_record_details(id))
        {
            Ok(details) => filters.matches(details.duration, &details.categories),
            Err(err) => {
                let err = CrawlError::DetailConfirmation {
                    id,
                    source: Box::new(err),
                };
                warn!(
                    action = "drop",
                    component = "detail_confirmer",
                    record_id = id,
                    error = %err,
                    "Could not confirm details, dropping record"
                );
                false
            }
        }
    }
}
