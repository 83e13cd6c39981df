//! Ports Layer - Trait definitions for external collaborators
//!
//! Following hexagonal architecture, these traits abstract:
//! - Price history retrieval (HTTP APIs, local CSV files)
//! - Statistics table persistence

pub mod price_source;
pub mod table_store;

pub use price_source::{PriceSource, PriceSourceError};
pub use table_store::{StatisticsStore, StoreError};

#[cfg(test)]
pub use price_source::MockPriceSource;
