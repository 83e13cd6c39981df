//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Market Data: Yahoo chart API and per-ticker CSV price files
//! - Storage: CSV statistics tables
//! - CLI: Command-line interface handlers

pub mod market_data;
pub mod storage;
pub mod cli;

pub use market_data::{CsvPriceSource, YahooChartClient};
pub use storage::CsvTableStore;
pub use cli::CliApp;
