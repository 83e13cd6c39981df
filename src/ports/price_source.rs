//! Price source port
//!
//! Anything able to produce a daily price history for a ticker.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::PriceSeries;

/// Price retrieval error type
#[derive(Error, Debug)]
pub enum PriceSourceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Data parsing error: {0}")]
    Parse(String),
}

/// Source of historical prices keyed by ticker
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the full available history for `ticker`
    ///
    /// Returns `Ok(None)` when the source has no data for the ticker.
    async fn fetch(&self, ticker: &str) -> Result<Option<PriceSeries>, PriceSourceError>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}
