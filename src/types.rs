//! Wire and domain types for the catalog harvester.

use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;
use std::ops::Add;

/// A single catalog item.
///
/// The harvester never looks inside a product; it only counts and forwards them.
pub type Product = Map<String, Value>;

/// Response body of one range query.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FetchResult {
    /// Number of products matching the queried range.
    pub total: u64,
    /// Number of products present in this response.
    pub count: u64,
    /// The products themselves, capped by the API limit.
    #[serde(default)]
    pub products: Vec<Product>,
}

/// A non-negative price with two decimal places of resolution.
///
/// Stored as whole hundredths so that boundary arithmetic never drifts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(u64);

impl Price {
    /// Zero.
    pub const ZERO: Price = Price(0);

    /// The smallest representable increment, 0.01.
    pub const STEP: Price = Price(1);

    // Keeps `value * 100` well inside the range where f64 holds integers exactly.
    const MAX_UNITS: f64 = 1e13;

    /// Create a price from a number of hundredths.
    pub const fn from_cents(cents: u64) -> Self {
        Price(cents)
    }

    /// Convert a decimal amount, rounding down to two decimal places.
    ///
    /// Values within 1e-8 below a whole cent count as that cent, so that
    /// amounts like `0.29` survive binary representation error. As a result
    /// `0.0099999999` becomes `0.01`.
    pub fn from_f64(value: f64) -> Result<Self> {
        if !value.is_finite() || value < 0.0 {
            return Err(Error::Config(format!(
                "price must be a finite, non-negative number, got {}",
                value
            )));
        }
        if value > Self::MAX_UNITS {
            return Err(Error::Config(format!("price {} is too large", value)));
        }
        // The nudge absorbs binary representation error (0.29 * 100 = 28.999...).
        Ok(Price((value * 100.0 + 1e-6).floor() as u64))
    }

    /// The amount in hundredths.
    pub const fn cents(self) -> u64 {
        self.0
    }

    /// The amount as a decimal number.
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl Add for Price {
    type Output = Price;

    fn add(self, rhs: Price) -> Price {
        Price(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac == 0 {
            write!(f, "{}", whole)
        } else if frac % 10 == 0 {
            write!(f, "{}.{}", whole, frac / 10)
        } else {
            write!(f, "{}.{:02}", whole, frac)
        }
    }
}

/// An inclusive price interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PriceRange {
    /// Lower bound.
    pub min: Price,
    /// Upper bound.
    pub max: Price,
}

impl PriceRange {
    /// Create a range from its bounds.
    pub const fn new(min: Price, max: Price) -> Self {
        Self { min, max }
    }

    /// Create a range from decimal bounds, validating them.
    pub fn from_f64(min: f64, max: f64) -> Result<Self> {
        let range = Self::new(Price::from_f64(min)?, Price::from_f64(max)?);
        if range.min > range.max {
            return Err(Error::Config(format!(
                "minimum price {} is above maximum price {}",
                range.min, range.max
            )));
        }
        Ok(range)
    }

    /// Query parameters for this range, in the form the catalog API expects.
    pub fn query_params(&self) -> [(&'static str, String); 2] {
        [
            ("minPrice", self.min.to_string()),
            ("maxPrice", self.max.to_string()),
        ]
    }
}

impl fmt::Display for PriceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}
