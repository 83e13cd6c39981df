//! Q-Variance - Windowed Volatility Dataset Builder and Scaling-Law Scorer
//!
//! Turns daily price histories into per-window normalized returns and
//! realized volatilities, then scores how well binned volatility follows
//! sigma² = σ₀² + z²/2.
//!
//! # Modules
//!
//! - `domain`: Core value types (PriceSeries, StatisticsTable, ScoreReport)
//! - `analysis`: WindowAggregator and QVarianceScorer
//! - `ports`: Trait abstractions (PriceSource, StatisticsStore)
//! - `adapters`: External implementations (Yahoo, CSV files, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Dataset building, submissions and synthetic data

pub mod domain;
pub mod analysis;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
