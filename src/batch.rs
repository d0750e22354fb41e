//! Single-range fetching with bounded retry and linear backoff.

use crate::client::ProductSource;
use crate::error::{Error, Result};
use crate::types::{FetchResult, PriceRange};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_BASE_DELAY_MS: u64 = 500;

/// How often, and how patiently, a range query is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub attempts: u32,
    /// Delay unit; the wait after attempt `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// A policy with the given attempt budget and the default delay unit.
    pub fn new(attempts: u32) -> Self {
        Self {
            attempts,
            ..Self::default()
        }
    }

    /// Set the delay unit.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Wait that follows the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * attempt
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

/// Fetch one price range, retrying transient failures.
///
/// Returns the first successful response. When the final attempt fails the
/// error is wrapped in [`Error::FetchFailed`] naming the range. A policy
/// with zero attempts yields [`Error::InvalidResponse`]. A rate-limited
/// attempt waits at least as long as the server's `Retry-After`.
pub async fn fetch_batch<S>(
    source: &S,
    range: PriceRange,
    policy: &RetryPolicy,
) -> Result<FetchResult>
where
    S: ProductSource + ?Sized,
{
    for attempt in 1..=policy.attempts {
        match source.fetch_range(range).await {
            Ok(result) => return Ok(result),
            Err(e) if !e.is_transient() => return Err(e),
            Err(e) => {
                if attempt == policy.attempts {
                    error!(
                        error = %e,
                        range = %range,
                        attempts = attempt,
                        "Failed to fetch products in price range. Aborting"
                    );
                    return Err(Error::FetchFailed {
                        range,
                        attempts: attempt,
                        source: Box::new(e),
                    });
                }

                let backoff = match &e {
                    // Never retry sooner than the server asked.
                    Error::RateLimit { retry_after, .. } => policy
                        .backoff(attempt)
                        .max(Duration::from_secs(*retry_after)),
                    _ => policy.backoff(attempt),
                };
                warn!(
                    error = %e,
                    range = %range,
                    attempt = attempt,
                    max_attempts = policy.attempts,
                    "Fetch failed. Retrying in {:?}",
                    backoff
                );
                sleep(backoff).await;
            }
        }
    }

    Err(Error::InvalidResponse)
}
