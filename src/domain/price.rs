//! Price Series
//!
//! Time-ordered closing prices for one instrument and the log-return
//! series derived from them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single dated observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub price: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, price: f64) -> Self {
        Self { date, price }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PriceSeriesError {
    #[error("Non-positive or non-finite price {price} at {date}")]
    InvalidPrice { date: NaiveDate, price: f64 },
    #[error("Dates not strictly increasing: {previous} followed by {next}")]
    NotIncreasing { previous: NaiveDate, next: NaiveDate },
}

/// Validated price history for one ticker
///
/// Dates are strictly increasing and every price is positive and finite.
/// An empty series is valid and stands for "no data".
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    ticker: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, rejecting unordered dates or invalid prices
    pub fn new(ticker: impl Into<String>, points: Vec<PricePoint>) -> Result<Self, PriceSeriesError> {
        for point in &points {
            if !(point.price.is_finite() && point.price > 0.0) {
                return Err(PriceSeriesError::InvalidPrice {
                    date: point.date,
                    price: point.price,
                });
            }
        }
        for pair in points.windows(2) {
            if pair[1].date <= pair[0].date {
                return Err(PriceSeriesError::NotIncreasing {
                    previous: pair[0].date,
                    next: pair[1].date,
                });
            }
        }
        Ok(Self {
            ticker: ticker.into(),
            points,
        })
    }

    /// Build a series from raw rows, silently dropping unusable ones
    ///
    /// Rows with non-positive or non-finite prices are discarded, the rest
    /// sorted by date, and duplicate dates keep the last observation.
    pub fn from_unsorted(ticker: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.retain(|p| p.price.is_finite() && p.price > 0.0);
        points.sort_by_key(|p| p.date);

        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }

        Self {
            ticker: ticker.into(),
            points: deduped,
        }
    }

    /// Empty series for an instrument with no available history
    pub fn empty(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            points: Vec::new(),
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Derive log-returns `ln(p[i+1]) - ln(p[i])`
    ///
    /// Each return is dated by the later of its two prices.
    pub fn log_returns(&self) -> ReturnSeries {
        let (dates, values) = self
            .points
            .windows(2)
            .map(|pair| (pair[1].date, pair[1].price.ln() - pair[0].price.ln()))
            .unzip();

        ReturnSeries { dates, values }
    }
}

/// Log-returns derived from a `PriceSeries`, one element shorter
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReturnSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl ReturnSeries {
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
