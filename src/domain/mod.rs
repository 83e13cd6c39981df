//! Domain Layer - Core data types for the q-variance pipeline
//!
//! Pure value types with no I/O:
//! - `price`: validated price histories and derived log-returns
//! - `stats`: per-window statistics and the tables exchanged between stages
//! - `report`: structured scoring output

pub mod price;
pub mod stats;
pub mod report;

pub use price::{PricePoint, PriceSeries, PriceSeriesError, ReturnSeries};
pub use stats::{GroupKey, NormalizedWindowStat, RawWindowStat, StatisticsTable};
pub use report::{AggregationMode, ScopeKey, ScopeScore, ScopeStatus, ScoreReport, SkippedScope};
