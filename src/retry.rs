use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::thread;
use std::time::Duration;
use tracing::error;

use crate::error::{CrawlError, CrawlResult, ServiceError};
use crate::service::SearchService;

pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// How many attempts a remote call gets before the run gives up on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryBudget {
    /// Retry forever.
    #[default]
    Unbounded,
    Attempts(NonZeroU32),
}

impl RetryBudget {
    pub fn attempts(n: u32) -> Option<Self> {
        NonZeroU32::new(n).map(Self::Attempts)
    }

    fn allows_another(&self, attempts_made: u32) -> bool {
        match self {
            Self::Unbounded => true,
            Self::Attempts(max) => attempts_made < max.get(),
        }
    }
}

impl fmt::Display for RetryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::Attempts(n) => write!(f, "{n}"),
        }
    }
}

impl FromStr for RetryBudget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unbounded" | "inf" | "forever" => Ok(Self::Unbounded),
            other => other
                .parse::<u32>()
                .ok()
                .and_then(Self::attempts)
                .ok_or_else(|| format!("expected a positive attempt count or 'unbounded', got '{s}'")),
        }
    }
}

/// Retries a remote call at a constant interval, clearing the service's
/// response cache between attempts.
#[derive(Debug, Clone)]
pub struct BackoffRetrier {
    budget: RetryBudget,
    backoff: Duration,
}

impl BackoffRetrier {
    pub fn new(budget: RetryBudget, backoff: Duration) -> Self {
        Self { budget, backoff }
    }

    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    /// Run `operation` until it succeeds or the budget is spent. `context`
    /// describes the request in logs and in the final error.
    pub fn call<S, T, F>(
        &self,
        service: &S,
        context: &dyn fmt::Display,
        mut operation: F,
    ) -> CrawlResult<T>
    where
        S: SearchService + ?Sized,
        F: FnMut(&S) -> Result<T, ServiceError>,
    {
        let mut attempts: u32 = 0;
        loop {
            attempts = attempts.saturating_add(1);
            let err = match operation(service) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            error!(
                action = "fail",
                component = "backoff_retrier",
                request = %context,
                attempt = attempts,
                budget = %self.budget,
                error = %err,
                "Remote call failed"
            );

            if !self.budget.allows_another(attempts) {
                return Err(CrawlError::ExhaustedRetries {
                    context: context.to_string(),
                    attempts,
                    source: err,
                });
            }

            error!(
                action = "retry",
                component = "backoff_retrier",
                backoff_ms = self.backoff.as_millis(),
                "Clearing cache and trying again"
            );
            service.invalidate_cache();
            thread::sleep(self.backoff);
        }
    }
}
