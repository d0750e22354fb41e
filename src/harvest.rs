//! Adaptive price-range partitioning.
//!
//! The catalog API caps every response at a fixed number of products and
//! offers no paging. The harvester learns the overall count with one
//! full-range query, then walks the price axis upward from zero, picking for
//! each step the widest candidate width whose range still fits under the cap.

use crate::batch::{fetch_batch, RetryPolicy};
use crate::client::{Client, ProductSource, DEFAULT_CATALOG_URL};
use crate::error::{Error, Result};
use crate::types::{Price, PriceRange, Product};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Maximum number of products the catalog API returns for one query.
pub const DEFAULT_API_LIMIT: u64 = 1000;

const DEFAULT_WIDTHS_CENTS: [u64; 8] = [100_000, 50_000, 25_000, 10_000, 1_000, 100, 10, 1];
const STREAM_BUFFER: usize = 4;

/// Candidate range widths, tried widest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidthLadder(Vec<Price>);

impl WidthLadder {
    /// Create a ladder. Widths must be non-zero and strictly descending.
    pub fn new(widths: impl IntoIterator<Item = Price>) -> Result<Self> {
        let widths: Vec<Price> = widths.into_iter().collect();
        if widths.is_empty() {
            return Err(Error::Config("width ladder must not be empty".into()));
        }
        if widths.iter().any(|w| *w == Price::ZERO) {
            return Err(Error::Config(format!(
                "every width must be at least {}",
                Price::STEP
            )));
        }
        if widths.windows(2).any(|pair| pair[0] <= pair[1]) {
            return Err(Error::Config(
                "width ladder must be strictly descending".into(),
            ));
        }
        Ok(Self(widths))
    }

    /// Create a ladder from decimal widths, each rounded down to two decimals.
    pub fn from_f64(widths: &[f64]) -> Result<Self> {
        let widths = widths
            .iter()
            .map(|w| Price::from_f64(*w))
            .collect::<Result<Vec<_>>>()?;
        Self::new(widths)
    }

    /// The widths, widest first.
    pub fn widths(&self) -> &[Price] {
        &self.0
    }
}

impl Default for WidthLadder {
    fn default() -> Self {
        Self(DEFAULT_WIDTHS_CENTS.iter().map(|c| Price::from_cents(*c)).collect())
    }
}

/// Options for one harvest.
#[derive(Debug, Clone)]
pub struct HarvestOptions {
    /// Catalog endpoint. Defaults to [`DEFAULT_CATALOG_URL`].
    pub url: Option<String>,
    /// Lower bound of the full-range query.
    pub min_price: f64,
    /// Upper bound of the whole harvest.
    pub max_price: f64,
    /// Attempts per range query.
    pub retries: u32,
    /// Stop with an error once this many passes have been accepted.
    pub max_iterations: Option<u32>,
    /// Products the API returns at most per query.
    pub api_limit: u64,
    /// Candidate widths for each pass.
    pub widths: WidthLadder,
    /// Delay unit for the linear retry backoff.
    pub retry_delay: Duration,
}

impl HarvestOptions {
    /// Options covering `[min_price, max_price]` with every other setting at its default.
    pub fn new(min_price: f64, max_price: f64) -> Self {
        let policy = RetryPolicy::default();
        Self {
            url: None,
            min_price,
            max_price,
            retries: policy.attempts,
            max_iterations: None,
            api_limit: DEFAULT_API_LIMIT,
            widths: WidthLadder::default(),
            retry_delay: policy.base_delay,
        }
    }

    /// Set the catalog endpoint.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the number of attempts per range query. Zero keeps the default of 3.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Limit the number of passes. Zero means no limit.
    pub fn max_iterations(mut self, limit: u32) -> Self {
        self.max_iterations = Some(limit);
        self
    }

    /// Set the per-query API limit.
    pub fn api_limit(mut self, limit: u64) -> Self {
        self.api_limit = limit;
        self
    }

    /// Set the candidate widths.
    pub fn widths(mut self, widths: WidthLadder) -> Self {
        self.widths = widths;
        self
    }

    /// Set the delay unit for retry backoff.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

/// One accepted sub-range and the products it returned.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeBatch {
    /// The queried range.
    pub range: PriceRange,
    /// Products the API reported for the range.
    pub total: u64,
    /// The products, in the API's order.
    pub products: Vec<Product>,
    /// Pass that accepted the range. Zero when the full-range query already fit.
    pub pass: u32,
}

/// Progress of one harvest. Never outlives the call that created it.
#[derive(Debug, Default)]
struct HarvestState {
    count_total: Option<u64>,
    count_fetched: u64,
    last_max_price: Price,
    passes: u32,
    finished: bool,
}

/// Walks a catalog's price axis until every product has been fetched.
pub struct Harvester<S> {
    source: S,
    range: PriceRange,
    policy: RetryPolicy,
    api_limit: u64,
    widths: WidthLadder,
    max_iterations: Option<u32>,
}

impl Harvester<Client> {
    /// Create a harvester that queries the configured URL over HTTP.
    pub fn from_options(options: HarvestOptions) -> Result<Self> {
        let url = options
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string());
        let client = Client::builder().url(url).build()?;
        Self::with_source(client, options)
    }
}

impl<S: ProductSource> Harvester<S> {
    /// Create a harvester over any product source. `options.url` is ignored.
    pub fn with_source(source: S, options: HarvestOptions) -> Result<Self> {
        let range = PriceRange::from_f64(options.min_price, options.max_price)?;
        if options.api_limit == 0 {
            return Err(Error::Config("API limit must be at least 1".into()));
        }
        // Zero means "not set" for both the attempt budget and the pass limit.
        let attempts = match options.retries {
            0 => RetryPolicy::default().attempts,
            n => n,
        };

        Ok(Self {
            source,
            range,
            policy: RetryPolicy::new(attempts).base_delay(options.retry_delay),
            api_limit: options.api_limit,
            widths: options.widths,
            max_iterations: options.max_iterations.filter(|limit| *limit > 0),
        })
    }

    /// The product source this harvester queries.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch every product in the configured range.
    ///
    /// Products are ordered by accepted sub-range, then by the API's own
    /// ordering. Any error discards everything fetched so far.
    pub async fn run(&self) -> Result<Vec<Product>> {
        let mut state = HarvestState::default();
        let mut products = Vec::new();

        while let Some(batch) = self.next_batch(&mut state).await? {
            products.extend(batch.products);
        }

        info!(
            products = products.len(),
            passes = state.passes,
            "Harvest complete"
        );
        Ok(products)
    }

    async fn next_batch(&self, state: &mut HarvestState) -> Result<Option<RangeBatch>> {
        if state.finished {
            return Ok(None);
        }

        let count_total = match state.count_total {
            Some(total) => total,
            None => {
                let all = fetch_batch(&self.source, self.range, &self.policy).await?;
                state.count_total = Some(all.total);
                info!(
                    range = %self.range,
                    total = all.total,
                    limit = self.api_limit,
                    "Catalog size"
                );

                if all.total <= self.api_limit {
                    state.count_fetched = all.total;
                    state.finished = true;
                    return Ok(Some(RangeBatch {
                        range: self.range,
                        total: all.total,
                        products: all.products,
                        pass: 0,
                    }));
                }
                if self.range.min > Price::ZERO {
                    debug!(
                        min_price = %self.range.min,
                        "Partitioned scan starts at 0, below the requested minimum"
                    );
                }
                all.total
            }
        };

        if state.count_fetched >= count_total {
            state.finished = true;
            return Ok(None);
        }

        if state.passes > 0 {
            if let Some(limit) = self.max_iterations {
                if state.passes >= limit {
                    error!(limit, fetched = state.count_fetched, "Iteration limit reached");
                    return Err(Error::IterationLimitExceeded { limit });
                }
            }
        }

        let lower = if state.passes == 0 {
            state.last_max_price
        } else {
            state.last_max_price + Price::STEP
        };
        if lower > self.range.max {
            error!(
                fetched = state.count_fetched,
                total = count_total,
                "Price domain exhausted before all products were found"
            );
            return Err(Error::DomainExhausted {
                fetched: state.count_fetched,
                total: count_total,
            });
        }

        let pass = state.passes + 1;
        let mut narrowest: Option<(PriceRange, u64)> = None;

        for &width in self.widths.widths() {
            let upper = (state.last_max_price + width).min(self.range.max);
            let trial = PriceRange::new(lower, upper);
            // Clamping at the maximum can repeat the previous trial.
            if narrowest.is_some_and(|(previous, _)| previous == trial) {
                continue;
            }

            let response = fetch_batch(&self.source, trial, &self.policy).await?;
            debug!(pass, range = %trial, width = %width, total = response.total, "Trial range");

            if response.total <= self.api_limit {
                state.count_fetched += response.total;
                state.last_max_price = upper;
                state.passes = pass;
                info!(
                    pass,
                    range = %trial,
                    total = response.total,
                    fetched = state.count_fetched,
                    expected = count_total,
                    "Accepted price range"
                );
                return Ok(Some(RangeBatch {
                    range: trial,
                    total: response.total,
                    products: response.products,
                    pass,
                }));
            }

            narrowest = Some((trial, response.total));
        }

        let (range, total) =
            narrowest.ok_or_else(|| Error::Config("width ladder must not be empty".into()))?;
        error!(
            range = %range,
            total,
            limit = self.api_limit,
            "More products than the API limit in the smallest possible range"
        );
        Err(Error::UnresolvableDensity {
            range,
            total,
            limit: self.api_limit,
        })
    }
}

impl<S: ProductSource + 'static> Harvester<S> {
    /// Run the harvest in the background, delivering each accepted range as it arrives.
    ///
    /// A fatal error is sent as the last item. Dropping the receiver stops the
    /// harvest before its next query. Must be called within a tokio runtime.
    pub fn stream(self) -> mpsc::Receiver<Result<RangeBatch>> {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);

        tokio::spawn(async move {
            let mut state = HarvestState::default();
            loop {
                match self.next_batch(&mut state).await {
                    Ok(Some(batch)) => {
                        if tx.send(Ok(batch)).await.is_err() {
                            debug!(passes = state.passes, "Receiver dropped. Stopping harvest");
                            return;
                        }
                    }
                    Ok(None) => return,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                }
            }
        });

        rx
    }
}

/// Fetch every product from the catalog described by `options`.
///
/// # Example
///
/// ```rust,no_run
/// use catalog_harvester::{fetch_products, HarvestOptions};
///
/// #[tokio::main]
/// async fn main() -> Result<(), catalog_harvester::Error> {
///     let products = fetch_products(
///         HarvestOptions::new(0.0, 100_000.0)
///             .url("https://catalog.example.com/products")
///             .max_iterations(500),
///     )
///     .await?;
///
///     println!("{} products", products.len());
///     Ok(())
/// }
/// ```
pub async fn fetch_products(options: HarvestOptions) -> Result<Vec<Product>> {
    Harvester::from_options(options)?.run().await
}
