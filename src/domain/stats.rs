//! Window Statistics
//!
//! Per-window summary records and the table exchanged between the
//! aggregator, persistence and the scorer.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One window's statistics before de-meaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawWindowStat {
    pub ticker: String,
    /// Date of the anchoring return (first or last in the window)
    pub date: NaiveDate,
    /// Nominal window length in return periods
    pub horizon: u32,
    /// Cumulative log-return scaled by sqrt(horizon in years)
    pub z_raw: f64,
    /// Annualized population standard deviation of the window's returns
    pub sigma: f64,
}

impl RawWindowStat {
    /// Finite z and finite, strictly positive sigma
    pub fn is_valid(&self) -> bool {
        self.z_raw.is_finite() && self.sigma.is_finite() && self.sigma > 0.0
    }
}

/// One window's statistics after per-group de-meaning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedWindowStat {
    pub ticker: String,
    pub date: NaiveDate,
    #[serde(rename = "T")]
    pub horizon: u32,
    pub z: f64,
    pub sigma: f64,
    /// False when the group was too small to de-mean and `z` is the raw value
    ///
    /// Tables without this column are read as de-meaned.
    #[serde(default = "default_demeaned")]
    pub demeaned: bool,
}

fn default_demeaned() -> bool {
    true
}

/// Grouping key used for de-meaning and per-scope scoring
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKey {
    pub ticker: String,
    pub horizon: u32,
}

impl GroupKey {
    pub fn new(ticker: impl Into<String>, horizon: u32) -> Self {
        Self {
            ticker: ticker.into(),
            horizon,
        }
    }
}

impl std::fmt::Display for GroupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/T={}", self.ticker, self.horizon)
    }
}

/// Unordered collection of normalized window statistics
///
/// Row order carries no meaning; all downstream grouping is keyed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsTable {
    rows: Vec<NormalizedWindowStat>,
}

impl StatisticsTable {
    pub fn new(rows: Vec<NormalizedWindowStat>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[NormalizedWindowStat] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<NormalizedWindowStat> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Concatenate another table onto this one
    pub fn merge(mut self, other: StatisticsTable) -> Self {
        self.rows.extend(other.rows);
        self
    }

    /// Concatenate any number of tables
    pub fn concat<I>(tables: I) -> Self
    where
        I: IntoIterator<Item = StatisticsTable>,
    {
        tables
            .into_iter()
            .fold(StatisticsTable::default(), StatisticsTable::merge)
    }

    /// Rows grouped by `(ticker, horizon)` in key order
    pub fn groups(&self) -> BTreeMap<GroupKey, Vec<&NormalizedWindowStat>> {
        let mut groups: BTreeMap<GroupKey, Vec<&NormalizedWindowStat>> = BTreeMap::new();
        for row in &self.rows {
            groups
                .entry(GroupKey::new(row.ticker.as_str(), row.horizon))
                .or_default()
                .push(row);
        }
        groups
    }

    /// Distinct tickers present in the table
    pub fn tickers(&self) -> Vec<&str> {
        let mut tickers: Vec<&str> = self.rows.iter().map(|r| r.ticker.as_str()).collect();
        tickers.sort_unstable();
        tickers.dedup();
        tickers
    }

    /// Split into `parts` contiguous chunks of near-equal size
    ///
    /// The last chunk absorbs the remainder. Returns a single chunk when
    /// `parts` is zero or one.
    pub fn split(&self, parts: usize) -> Vec<StatisticsTable> {
        if parts <= 1 || self.rows.len() < parts {
            return vec![self.clone()];
        }
        let chunk = self.rows.len() / parts;
        (0..parts)
            .map(|i| {
                let start = i * chunk;
                let end = if i + 1 == parts { self.rows.len() } else { start + chunk };
                StatisticsTable::new(self.rows[start..end].to_vec())
            })
            .collect()
    }
}

impl FromIterator<NormalizedWindowStat> for StatisticsTable {
    fn from_iter<T: IntoIterator<Item = NormalizedWindowStat>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
