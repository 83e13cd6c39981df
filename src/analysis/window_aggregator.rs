//! Window Aggregator
//!
//! Turns one instrument's price history into per-horizon window statistics:
//!
//! - Returns are cut into non-overlapping windows of T returns, starting at 0
//! - sigma = population std of the window * sqrt(periods_per_year)
//! - z_raw = sum of the window / sqrt(T / periods_per_year)
//! - Windows with non-finite z or non-positive sigma are dropped
//! - z is de-meaned per (ticker, T) group
//!
//! Rejection is an expected filtering step and is never reported as an error.

use std::collections::BTreeMap;

use statrs::statistics::Statistics;
use tracing::debug;

use crate::analysis::params::{AnchorPolicy, ConfigError, WindowConfig};
use crate::domain::{GroupKey, NormalizedWindowStat, PriceSeries, RawWindowStat, StatisticsTable};

/// Per-horizon bookkeeping from one aggregation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HorizonSummary {
    pub horizon: u32,
    /// Windows that passed the completeness check
    pub windows: usize,
    /// Windows discarded for non-finite or zero statistics
    pub rejected: usize,
    /// Returns left over after the last window
    pub tail_dropped: usize,
}

/// Converts price series into normalized statistics tables
#[derive(Debug, Clone)]
pub struct WindowAggregator {
    config: WindowConfig,
    annualization: f64,
}

impl WindowAggregator {
    /// Create an aggregator, validating the configuration up front
    pub fn new(config: WindowConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let annualization = config.annualization_factor();
        Ok(Self {
            config,
            annualization,
        })
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Full pipeline: window statistics then per-group de-meaning
    ///
    /// An empty or single-point series yields an empty table.
    pub fn aggregate(&self, series: &PriceSeries) -> StatisticsTable {
        let raw = self.window_stats(series);
        let table = self.normalize(raw);
        debug!(
            ticker = series.ticker(),
            rows = table.len(),
            "aggregated price series"
        );
        table
    }

    /// Compute raw window statistics for every configured horizon
    pub fn window_stats(&self, series: &PriceSeries) -> Vec<RawWindowStat> {
        self.window_stats_with_summary(series).0
    }

    /// As `window_stats`, also returning per-horizon counts
    pub fn window_stats_with_summary(
        &self,
        series: &PriceSeries,
    ) -> (Vec<RawWindowStat>, Vec<HorizonSummary>) {
        let returns = series.log_returns();
        let values = returns.values();
        let dates = returns.dates();

        let mut stats = Vec::new();
        let mut summaries = Vec::with_capacity(self.config.horizons.len());

        for &horizon in &self.config.horizons {
            let step = horizon as usize;
            let min_len = self.config.policy.min_window_len(horizon);
            let mut summary = HorizonSummary {
                horizon,
                ..Default::default()
            };

            let mut start = 0;
            while start < values.len() {
                let end = (start + step).min(values.len());
                if end - start < min_len {
                    summary.tail_dropped = end - start;
                    break;
                }
                summary.windows += 1;

                let anchor = match self.config.policy.anchor {
                    AnchorPolicy::First => dates[start],
                    AnchorPolicy::Last => dates[end - 1],
                };
                let stat = RawWindowStat {
                    ticker: series.ticker().to_string(),
                    date: anchor,
                    horizon,
                    z_raw: self.normalized_return(&values[start..end], horizon),
                    sigma: self.realized_volatility(&values[start..end]),
                };

                if stat.is_valid() {
                    stats.push(stat);
                } else {
                    summary.rejected += 1;
                }
                start += step;
            }

            debug!(
                ticker = series.ticker(),
                horizon,
                windows = summary.windows,
                rejected = summary.rejected,
                tail_dropped = summary.tail_dropped,
                "horizon processed"
            );
            summaries.push(summary);
        }

        (stats, summaries)
    }

    /// Annualized population standard deviation of a window
    pub fn realized_volatility(&self, window: &[f64]) -> f64 {
        window.iter().population_std_dev() * self.annualization
    }

    /// Cumulative return scaled by the square root of the nominal horizon in years
    pub fn normalized_return(&self, window: &[f64], horizon: u32) -> f64 {
        let total: f64 = window.iter().sum();
        total / (horizon as f64 / self.config.periods_per_year).sqrt()
    }

    /// Subtract each (ticker, T) group's mean z from its members
    ///
    /// Groups smaller than `min_group_size` keep their raw values and are
    /// flagged with `demeaned = false`.
    pub fn normalize(&self, raw: Vec<RawWindowStat>) -> StatisticsTable {
        let mut sums: BTreeMap<GroupKey, (f64, usize)> = BTreeMap::new();
        for stat in &raw {
            let entry = sums
                .entry(GroupKey::new(stat.ticker.as_str(), stat.horizon))
                .or_insert((0.0, 0));
            entry.0 += stat.z_raw;
            entry.1 += 1;
        }

        let means: BTreeMap<GroupKey, Option<f64>> = sums
            .into_iter()
            .map(|(key, (sum, count))| {
                if count >= self.config.min_group_size {
                    (key, Some(sum / count as f64))
                } else {
                    debug!(group = %key, count, "group below de-meaning minimum, keeping raw z");
                    (key, None)
                }
            })
            .collect();

        raw.into_iter()
            .map(|stat| {
                let mean = means
                    .get(&GroupKey::new(stat.ticker.as_str(), stat.horizon))
                    .copied()
                    .flatten();
                NormalizedWindowStat {
                    z: mean.map_or(stat.z_raw, |m| stat.z_raw - m),
                    demeaned: mean.is_some(),
                    ticker: stat.ticker,
                    date: stat.date,
                    horizon: stat.horizon,
                    sigma: stat.sigma,
                }
            })
            .collect()
    }
}
