//! HTTP client for the price-filtered catalog API.

use crate::error::{Error, Result};
use crate::types::{FetchResult, PriceRange};
use crate::version::build_user_agent;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, USER_AGENT};
use std::time::Duration;
use tracing::{debug, warn};

/// Catalog endpoint used when no URL is configured.
pub const DEFAULT_CATALOG_URL: &str = "https://api.ecommerce.com/products";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Anything that can answer a single price-range query.
///
/// [`Client`] talks to the real API; tests and alternative transports can
/// provide their own implementation.
#[async_trait]
pub trait ProductSource: Send + Sync {
    /// Fetch the products whose price lies within `range`.
    async fn fetch_range(&self, range: PriceRange) -> Result<FetchResult>;
}

/// Builder for constructing a [`Client`].
pub struct ClientBuilder {
    url: String,
    timeout: Duration,
    user_agent_suffix: Option<String>,
}

impl ClientBuilder {
    /// Create a new client builder pointed at the default catalog endpoint.
    pub fn new() -> Self {
        Self {
            url: DEFAULT_CATALOG_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent_suffix: None,
        }
    }

    /// Set the catalog endpoint URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom User-Agent suffix.
    pub fn user_agent_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.user_agent_suffix = Some(suffix.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Client> {
        let parsed = reqwest::Url::parse(&self.url)
            .map_err(|e| Error::Config(format!("invalid catalog URL {:?}: {}", self.url, e)))?;

        if parsed.scheme() != "https" {
            warn!(
                url = %self.url,
                "Catalog URL is not using HTTPS. This is insecure."
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(Error::Http)?;

        let user_agent = build_user_agent(self.user_agent_suffix.as_deref());
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&user_agent)
                .map_err(|e| Error::Config(format!("invalid User-Agent suffix: {}", e)))?,
        );

        Ok(Client {
            url: parsed,
            http_client,
            headers,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Client for the catalog API.
///
/// Issues exactly one request per call; retrying is left to
/// [`fetch_batch`](crate::fetch_batch).
///
/// # Example
///
/// ```rust,no_run
/// use catalog_harvester::{Client, PriceRange, ProductSource};
///
/// #[tokio::main]
/// async fn main() -> Result<(), catalog_harvester::Error> {
///     let client = Client::builder()
///         .url("https://catalog.example.com/products")
///         .build()?;
///
///     let page = client.fetch_range(PriceRange::from_f64(0.0, 49.99)?).await?;
///     println!("{} of {} products", page.count, page.total);
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct Client {
    url: reqwest::Url,
    http_client: reqwest::Client,
    headers: HeaderMap,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// The catalog endpoint this client queries.
    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

#[async_trait]
impl ProductSource for Client {
    async fn fetch_range(&self, range: PriceRange) -> Result<FetchResult> {
        debug!(url = %self.url, range = %range, "Fetching price range");

        let response = self
            .http_client
            .get(self.url.clone())
            .headers(self.headers.clone())
            .query(&range.query_params())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout
                } else {
                    Error::Http(e)
                }
            })?;

        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }

        let value: serde_json::Value = response.json().await.map_err(Error::Http)?;
        serde_json::from_value(value).map_err(Error::Json)
    }
}
