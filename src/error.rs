//! Error types for the catalog harvester.

use crate::types::PriceRange;
use thiserror::Error;

/// Result type for harvester operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the catalog harvester.
#[derive(Error, Debug)]
pub enum Error {
    /// The catalog API returned a non-success status.
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message
        message: String,
    },

    /// The catalog API is throttling requests.
    #[error("Rate limited. Retry after {retry_after} seconds")]
    RateLimit {
        /// Seconds the server asked us to wait
        retry_after: u64,
        /// Error message
        message: String,
    },

    /// Network or HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request timeout.
    #[error("Request timed out")]
    Timeout,

    /// Every attempt to fetch a price range failed.
    #[error("Failed to fetch products in price range {range} after {attempts} attempts")]
    FetchFailed {
        /// The range that could not be fetched
        range: PriceRange,
        /// Number of attempts made
        attempts: u32,
        /// Error from the final attempt
        #[source]
        source: Box<Error>,
    },

    /// The fetch loop ended without a result or an error.
    #[error("Invalid server response")]
    InvalidResponse,

    /// The configured pass limit was reached before the catalog was covered.
    #[error("Reached the iteration limit {limit} while fetching products")]
    IterationLimitExceeded {
        /// The configured pass limit
        limit: u32,
    },

    /// Even the narrowest candidate width holds more items than the API returns.
    #[error("More than {limit} products in smallest possible range {range} ({total} found)")]
    UnresolvableDensity {
        /// The narrowest range that was tried
        range: PriceRange,
        /// Items the API reported for that range
        total: u64,
        /// The per-query API limit
        limit: u64,
    },

    /// The whole price domain was scanned but fewer items were found than reported.
    #[error("Price domain exhausted with {fetched} of {total} products fetched")]
    DomainExhausted {
        /// Items accepted so far
        fetched: u64,
        /// Items the full-range query reported
        total: u64,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether a single failed attempt with this error is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::Api { .. }
                | Error::RateLimit { .. }
                | Error::Http(_)
                | Error::Json(_)
                | Error::Timeout
        )
    }

    /// Create an API error from a response.
    pub(crate) async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();

        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(1);

        let body: std::result::Result<ErrorResponse, _> = response.json().await;
        let message = match body {
            Ok(err) => err
                .error
                .or(err.message)
                .unwrap_or_else(|| "Unknown error".into()),
            Err(_) => "Unknown error".into(),
        };

        match status {
            429 => Error::RateLimit {
                retry_after,
                message,
            },
            _ => Error::Api { status, message },
        }
    }
}

#[derive(serde::Deserialize)]
struct ErrorResponse {
    error: Option<String>,
    message: Option<String>,
}
