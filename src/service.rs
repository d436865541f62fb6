use crate::domain::{DetailRecord, Query, ResultPage};
use crate::error::ServiceError;

/// Handle to the paginated search service.
///
/// Implementations are shared by every page-fetch worker, so they must be
/// `Send + Sync`. `invalidate_cache` may be called concurrently from several
/// failing workers and must be idempotent.
pub trait SearchService: Send + Sync {
    /// Fetch the page named by `query.page`.
    fn search_page(&self, query: &Query) -> Result<ResultPage, ServiceError>;

    fn search_first_page(&self, query: &Query) -> Result<ResultPage, ServiceError> {
        if query.page == 1 {
            self.search_page(query)
        } else {
            self.search_page(&Query {
                page: 1,
                ..query.clone()
            })
        }
    }

    /// Drop any client-side response cache. Best effort.
    fn invalidate_cache(&self);

    fn fetch_record_details(&self, id: u64) -> Result<DetailRecord, ServiceError>;
}
