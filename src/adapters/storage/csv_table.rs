use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::domain::{NormalizedWindowStat, StatisticsTable};
use crate::ports::{StatisticsStore, StoreError};

/// Statistics tables as CSV with header `ticker,date,T,z,sigma,demeaned`
#[derive(Debug, Clone, Default)]
pub struct CsvTableStore;

impl CsvTableStore {
    pub fn new() -> Self {
        Self
    }

    /// Write `table` as `parts` files named `<stem>_part1.csv` … under `dir`
    ///
    /// With `parts <= 1` a single `<stem>.csv` is written. Returns the paths
    /// in part order.
    pub fn save_split(
        &self,
        table: &StatisticsTable,
        dir: &Path,
        stem: &str,
        parts: usize,
    ) -> Result<Vec<PathBuf>, StoreError> {
        if parts <= 1 {
            let path = dir.join(format!("{}.csv", stem));
            self.save(table, &path)?;
            return Ok(vec![path]);
        }

        table
            .split(parts)
            .iter()
            .enumerate()
            .map(|(i, chunk)| {
                let path = dir.join(format!("{}_part{}.csv", stem, i + 1));
                self.save(chunk, &path)?;
                Ok(path)
            })
            .collect()
    }
}

fn csv_error(path: &Path) -> impl FnOnce(csv::Error) -> StoreError + '_ {
    move |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

impl StatisticsStore for CsvTableStore {
    fn save(&self, table: &StatisticsTable, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let file = File::create(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = csv::Writer::from_writer(file);

        if table.is_empty() {
            writer
                .write_record(["ticker", "date", "T", "z", "sigma", "demeaned"])
                .map_err(csv_error(path))?;
        }
        for row in table.rows() {
            writer.serialize(row).map_err(csv_error(path))?;
        }
        writer.flush().map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        tracing::debug!("Wrote {} rows to {}", table.len(), path.display());
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<StatisticsTable, StoreError> {
        if !path.exists() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }

        let mut reader = csv::Reader::from_path(path).map_err(csv_error(path))?;
        let table = reader
            .deserialize::<NormalizedWindowStat>()
            .collect::<Result<StatisticsTable, _>>()
            .map_err(csv_error(path))?;

        tracing::debug!("Read {} rows from {}", table.len(), path.display());
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn row(ticker: &str, day: u32, horizon: u32, z: f64, demeaned: bool) -> NormalizedWindowStat {
        NormalizedWindowStat {
            ticker: ticker.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
            horizon,
            z,
            sigma: 0.1834567890123,
            demeaned,
        }
    }

    fn sample() -> StatisticsTable {
        StatisticsTable::new(vec![
            row("AAPL", 1, 5, 0.012345678901234, true),
            row("AAPL", 8, 5, -0.012345678901234, true),
            row("MSFT", 1, 10, 0.3, false),
        ])
    }

    #[test]
    fn test_save_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out/dataset.csv");

        CsvTableStore::new().save(&sample(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("ticker,date,T,z,sigma,demeaned"));
        assert_eq!(
            lines.next(),
            Some("AAPL,2024-05-01,5,0.012345678901234,0.1834567890123,true")
        );
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_load_restores_full_precision() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dataset.csv");
        let store = CsvTableStore::new();

        store.save(&sample(), &path).unwrap();
        let loaded = store.load(&path).unwrap();

        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.csv");
        let store = CsvTableStore::new();

        store.save(&StatisticsTable::default(), &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim(), "ticker,date,T,z,sigma,demeaned");
        assert!(store.load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_split_and_load_all() {
        let dir = TempDir::new().unwrap();
        let store = CsvTableStore::new();

        let paths = store.save_split(&sample(), dir.path(), "dataset", 2).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].ends_with("dataset_part1.csv"));
        assert!(paths[1].ends_with("dataset_part2.csv"));

        let loaded = store.load_all(&paths).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_single_part_uses_stem() {
        let dir = TempDir::new().unwrap();
        let paths = CsvTableStore::new()
            .save_split(&sample(), dir.path(), "dataset", 1)
            .unwrap();
        assert_eq!(paths, vec![dir.path().join("dataset.csv")]);
    }

    #[test]
    fn test_loads_five_column_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("released.csv");
        std::fs::write(
            &path,
            "ticker,date,T,sigma,z\nAAPL,2024-05-01,5,0.2,0.01\nMSFT,2024-05-08,10,0.35,-0.125\n",
        )
        .unwrap();

        let loaded = CsvTableStore::new().load(&path).unwrap();

        assert_eq!(loaded.len(), 2);
        let first = &loaded.rows()[0];
        assert_eq!(first.ticker, "AAPL");
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(first.horizon, 5);
        assert_eq!(first.sigma, 0.2);
        assert_eq!(first.z, 0.01);
        assert!(first.demeaned);
        assert_eq!(loaded.rows()[1].horizon, 10);
        assert_eq!(loaded.rows()[1].z, -0.125);
        assert!(loaded.rows().iter().all(|r| r.demeaned));
    }

    #[test]
    fn test_missing_file() {
        let result = CsvTableStore::new().load(Path::new("/nonexistent/dataset.csv"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
