//! Harvest every product from a price-filtered catalog API.
//!
//! The catalog API answers "which products cost between `minPrice` and
//! `maxPrice`?" but silently truncates each answer to a fixed limit and has
//! no paging. This crate recovers the complete list by splitting the price
//! axis into ranges narrow enough to stay under the limit, retrying
//! transient failures along the way.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use catalog_harvester::{fetch_products, HarvestOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), catalog_harvester::Error> {
//!     let products = fetch_products(
//!         HarvestOptions::new(0.0, 100_000.0)
//!             .url("https://catalog.example.com/products")
//!             .retries(5),
//!     )
//!     .await?;
//!
//!     println!("Fetched {} products", products.len());
//!     Ok(())
//! }
//! ```

mod batch;
mod client;
mod error;
mod harvest;
mod types;
mod version;

pub use batch::{fetch_batch, RetryPolicy};
pub use client::{Client, ClientBuilder, ProductSource, DEFAULT_CATALOG_URL};
pub use error::{Error, Result};
pub use harvest::{
    fetch_products, HarvestOptions, Harvester, RangeBatch, WidthLadder, DEFAULT_API_LIMIT,
};
pub use types::*;
pub use version::SDK_VERSION;
