//! Market Data Adapters
//!
//! Sources of daily price histories:
//! - `YahooChartClient`: Yahoo Finance chart API (adjusted closes)
//! - `CsvPriceSource`: one local CSV file per ticker

mod csv_prices;
mod yahoo_chart;

pub use csv_prices::{CsvPriceSource, DEFAULT_DATE_COLUMN, DEFAULT_PRICE_COLUMN};
pub use yahoo_chart::YahooChartClient;
