//! Storage Adapters
//!
//! CSV persistence for statistics tables.

mod csv_table;

pub use csv_table::CsvTableStore;
