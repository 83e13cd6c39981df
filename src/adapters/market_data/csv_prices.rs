use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::{PricePoint, PriceSeries};
use crate::ports::{PriceSource, PriceSourceError};

/// Default date column header
pub const DEFAULT_DATE_COLUMN: &str = "Date";
/// Default price column header
pub const DEFAULT_PRICE_COLUMN: &str = "Price";

/// Price histories stored as one CSV file per ticker (`<dir>/<TICKER>.csv`)
#[derive(Debug, Clone)]
pub struct CsvPriceSource {
    dir: PathBuf,
    date_column: String,
    price_column: String,
}

impl CsvPriceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            date_column: DEFAULT_DATE_COLUMN.to_string(),
            price_column: DEFAULT_PRICE_COLUMN.to_string(),
        }
    }

    /// Use custom column headers
    pub fn with_columns(mut self, date_column: impl Into<String>, price_column: impl Into<String>) -> Self {
        self.date_column = date_column.into();
        self.price_column = price_column.into();
        self
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker))
    }

    /// Read one price file
    ///
    /// Rows with blank, unparseable, non-positive or non-finite prices are
    /// skipped; rows with unparseable dates are an error.
    pub fn read_file(&self, ticker: &str, path: &Path) -> Result<PriceSeries, PriceSourceError> {
        let mut reader = csv::Reader::from_path(path)?;
        let headers = reader.headers()?.clone();

        let column = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| {
                    PriceSourceError::Parse(format!("{}: missing column '{}'", path.display(), name))
                })
        };
        let date_idx = column(&self.date_column)?;
        let price_idx = column(&self.price_column)?;

        let mut points = Vec::new();
        for record in reader.records() {
            let record = record?;
            let raw_date = record.get(date_idx).unwrap_or("").trim();
            let date = parse_date(raw_date).ok_or_else(|| {
                PriceSourceError::Parse(format!("{}: bad date '{}'", path.display(), raw_date))
            })?;
            if let Some(price) = record.get(price_idx).and_then(|p| p.trim().parse::<f64>().ok()) {
                points.push(PricePoint::new(date, price));
            }
        }

        Ok(PriceSeries::from_unsorted(ticker, points))
    }

    /// Write `series` to `<dir>/<TICKER>.csv` using the configured headers
    pub fn save(&self, series: &PriceSeries) -> Result<PathBuf, PriceSourceError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(series.ticker());

        let mut writer = csv::Writer::from_path(&path)?;
        writer.write_record([self.date_column.as_str(), self.price_column.as_str()])?;
        for point in series.points() {
            writer.write_record([point.date.format("%Y-%m-%d").to_string(), point.price.to_string()])?;
        }
        writer.flush()?;

        Ok(path)
    }
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time component
fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[async_trait]
impl PriceSource for CsvPriceSource {
    async fn fetch(&self, ticker: &str) -> Result<Option<PriceSeries>, PriceSourceError> {
        let path = self.path_for(ticker);
        if !path.exists() {
            tracing::debug!("No price file for {} at {}", ticker, path.display());
            return Ok(None);
        }

        let series = self.read_file(ticker, &path)?;
        if series.is_empty() {
            return Ok(None);
        }
        Ok(Some(series))
    }

    fn name(&self) -> &'static str {
        "csv"
    }
}
