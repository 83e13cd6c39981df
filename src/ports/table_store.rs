//! Statistics table persistence port

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::StatisticsTable;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("No table files matched {0}")]
    NotFound(PathBuf),
}

/// Reads and writes statistics tables
pub trait StatisticsStore {
    /// Write a table to `path`, replacing any existing file
    fn save(&self, table: &StatisticsTable, path: &Path) -> Result<(), StoreError>;

    /// Read a single table file
    fn load(&self, path: &Path) -> Result<StatisticsTable, StoreError>;

    /// Read several table files and concatenate them
    fn load_all(&self, paths: &[PathBuf]) -> Result<StatisticsTable, StoreError> {
        paths
            .iter()
            .map(|path| self.load(path))
            .try_fold(StatisticsTable::default(), |acc, table| Ok(acc.merge(table?)))
    }
}
