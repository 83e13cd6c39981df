//! Analysis Parameters
//!
//! Configuration structs for window aggregation and q-variance scoring.
//! Defaults reproduce the reference challenge: weekly horizons from 1 to 26
//! weeks of daily data, 24 bins over z in [-0.5, 0.5), pass at R² >= 0.92.

use serde::{Deserialize, Serialize};

use crate::domain::AggregationMode;

/// Trading days per year for daily data
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Largest partition of the z range a scoring config may request
pub const MAX_BINS: usize = 10_000;

/// Combined configuration for both analysis components
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub windows: WindowConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.windows.validate()?;
        self.scoring.validate()?;
        Ok(())
    }
}

/// Which return in a window supplies its anchor date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorPolicy {
    First,
    #[default]
    Last,
}

/// Window edge policy
///
/// A window is formed while the remaining returns cover at least
/// `min_completeness * T`; a shorter tail ends the walk for that horizon.
/// The default of 1.0 only ever forms full windows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowPolicy {
    pub min_completeness: f64,
    pub anchor: AnchorPolicy,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self::full_windows_only()
    }
}

impl WindowPolicy {
    /// Only exact-length windows, anchored on the last return
    pub fn full_windows_only() -> Self {
        Self {
            min_completeness: 1.0,
            anchor: AnchorPolicy::Last,
        }
    }

    /// Also keep a tail window covering at least `min_completeness * T`
    pub fn partial_tail(min_completeness: f64) -> Self {
        Self {
            min_completeness,
            anchor: AnchorPolicy::Last,
        }
    }

    /// Smallest acceptable length for a window of nominal length `horizon`
    pub fn min_window_len(&self, horizon: u32) -> usize {
        // tolerance keeps e.g. 15 * 0.8 from rounding up to 13
        (horizon as f64 * self.min_completeness - 1e-9).ceil().max(1.0) as usize
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.min_completeness > 0.0 && self.min_completeness <= 1.0) {
            return Err(ConfigError::InvalidCompleteness(self.min_completeness));
        }
        Ok(())
    }
}

/// Window aggregation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window lengths in return periods
    pub horizons: Vec<u32>,
    /// Sampling periods per year; sqrt of this annualizes volatility
    pub periods_per_year: f64,
    pub policy: WindowPolicy,
    /// Groups smaller than this keep their raw z and are flagged
    pub min_group_size: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            horizons: (1..=26).map(|w| 5 * w).collect(),
            periods_per_year: TRADING_DAYS_PER_YEAR,
            policy: WindowPolicy::default(),
            min_group_size: 1,
        }
    }
}

impl WindowConfig {
    /// Use a custom horizon set
    pub fn with_horizons(mut self, horizons: Vec<u32>) -> Self {
        self.horizons = horizons;
        self
    }

    /// Use a custom window edge policy
    pub fn with_policy(mut self, policy: WindowPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Use a custom de-meaning minimum
    pub fn with_min_group_size(mut self, size: usize) -> Self {
        self.min_group_size = size;
        self
    }

    /// Factor converting per-period standard deviation to annual volatility
    pub fn annualization_factor(&self) -> f64 {
        self.periods_per_year.sqrt()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizons.is_empty() {
            return Err(ConfigError::NoHorizons);
        }
        if self.horizons.contains(&0) {
            return Err(ConfigError::InvalidHorizon(0));
        }
        let mut sorted = self.horizons.clone();
        sorted.sort_unstable();
        if let Some(pair) = sorted.windows(2).find(|p| p[0] == p[1]) {
            return Err(ConfigError::DuplicateHorizon(pair[0]));
        }
        if !(self.periods_per_year.is_finite() && self.periods_per_year > 0.0) {
            return Err(ConfigError::InvalidPeriodsPerYear(self.periods_per_year));
        }
        if self.min_group_size == 0 {
            return Err(ConfigError::InvalidGroupSize);
        }
        self.policy.validate()?;
        Ok(())
    }
}

/// How the z axis is partitioned
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinSpec {
    Count(usize),
    Width(f64),
}

impl BinSpec {
    /// Number of bins this spec lays over a range of length `span`
    ///
    /// Returned as f64 so oversized requests can be checked before any
    /// conversion. A width that does not divide the span evenly adds one
    /// clipped bin.
    pub fn count_over(&self, span: f64) -> f64 {
        match *self {
            BinSpec::Count(count) => count as f64,
            BinSpec::Width(width) => ((span / width) - 1e-9).ceil().max(1.0),
        }
    }
}

/// Quantity the model is fitted against
///
/// `Volatility` fits `sqrt(σ₀² + z²/2)` to mean sigma per bin;
/// `Variance` fits `σ₀² + z²/2` to mean sigma² per bin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitTarget {
    #[default]
    Volatility,
    Variance,
}

/// Q-variance scoring configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Lower edge of the binned z range (inclusive)
    pub z_min: f64,
    /// Upper edge of the binned z range (exclusive)
    pub z_max: f64,
    pub bins: BinSpec,
    /// Scopes with fewer records are skipped entirely
    pub min_points_per_scope: usize,
    /// Fewer usable bins than this scores the scope as zero
    pub min_usable_bins: usize,
    /// Bins with fewer members are ignored
    pub min_points_per_bin: usize,
    /// Minimum R² for a passing verdict
    pub pass_threshold: f64,
    /// Starting point for the σ₀ search
    pub sigma0_initial: f64,
    /// Upper bound on σ₀ (lower bound is zero)
    pub sigma0_max: f64,
    pub target: FitTarget,
    pub aggregation: AggregationMode,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            z_min: -0.5,
            z_max: 0.5,
            bins: BinSpec::Count(24),
            min_points_per_scope: 50,
            min_usable_bins: 10,
            min_points_per_bin: 1,
            pass_threshold: 0.92,
            sigma0_initial: 0.10,
            sigma0_max: 0.5,
            target: FitTarget::Volatility,
            aggregation: AggregationMode::PerScope,
        }
    }
}

impl ScoringConfig {
    /// Pool every record into one global fit
    pub fn pooled(mut self) -> Self {
        self.aggregation = AggregationMode::Pooled;
        self
    }

    /// Use a custom z range and partition
    pub fn with_bins(mut self, z_min: f64, z_max: f64, bins: BinSpec) -> Self {
        self.z_min = z_min;
        self.z_max = z_max;
        self.bins = bins;
        self
    }

    /// Override the scope and bin minimums
    pub fn with_minimums(mut self, per_scope: usize, usable_bins: usize, per_bin: usize) -> Self {
        self.min_points_per_scope = per_scope;
        self.min_usable_bins = usable_bins;
        self.min_points_per_bin = per_bin;
        self
    }

    /// Use a different fit target
    pub fn with_target(mut self, target: FitTarget) -> Self {
        self.target = target;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.z_min.is_finite() && self.z_max.is_finite()) || self.z_min >= self.z_max {
            return Err(ConfigError::InvalidBinRange {
                min: self.z_min,
                max: self.z_max,
            });
        }
        match self.bins {
            BinSpec::Count(0) => return Err(ConfigError::InvalidBinCount),
            BinSpec::Width(w) if !(w.is_finite() && w > 0.0) => {
                return Err(ConfigError::InvalidBinWidth(w));
            }
            _ => {}
        }
        let requested = self.bins.count_over(self.z_max - self.z_min);
        if !(requested <= MAX_BINS as f64) {
            return Err(ConfigError::TooManyBins {
                requested,
                max: MAX_BINS,
            });
        }
        if self.min_usable_bins == 0 {
            return Err(ConfigError::InvalidUsableBins);
        }
        if self.min_points_per_bin == 0 {
            return Err(ConfigError::InvalidPointsPerBin);
        }
        if !(0.0..=1.0).contains(&self.pass_threshold) {
            return Err(ConfigError::InvalidPassThreshold(self.pass_threshold));
        }
        if !(self.sigma0_max.is_finite() && self.sigma0_max > 0.0) {
            return Err(ConfigError::InvalidSigmaBound(self.sigma0_max));
        }
        if !(self.sigma0_initial >= 0.0 && self.sigma0_initial <= self.sigma0_max) {
            return Err(ConfigError::InvalidSigmaGuess {
                guess: self.sigma0_initial,
                max: self.sigma0_max,
            });
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("No horizons configured")]
    NoHorizons,
    #[error("Invalid horizon: {0} (must be > 0)")]
    InvalidHorizon(u32),
    #[error("Duplicate horizon: {0}")]
    DuplicateHorizon(u32),
    #[error("Invalid periods per year: {0} (must be > 0)")]
    InvalidPeriodsPerYear(f64),
    #[error("Invalid window completeness: {0} (must be 0 < c <= 1)")]
    InvalidCompleteness(f64),
    #[error("Invalid minimum group size: must be >= 1")]
    InvalidGroupSize,
    #[error("Invalid bin range: [{min}, {max}) (min must be < max)")]
    InvalidBinRange { min: f64, max: f64 },
    #[error("Invalid bin count: must be >= 1")]
    InvalidBinCount,
    #[error("Invalid bin width: {0} (must be > 0)")]
    InvalidBinWidth(f64),
    #[error("Too many bins: {requested} (max {max})")]
    TooManyBins { requested: f64, max: usize },
    #[error("Invalid minimum usable bins: must be >= 1")]
    InvalidUsableBins,
    #[error("Invalid minimum points per bin: must be >= 1")]
    InvalidPointsPerBin,
    #[error("Invalid pass threshold: {0} (must be 0-1)")]
    InvalidPassThreshold(f64),
    #[error("Invalid sigma0 upper bound: {0} (must be > 0)")]
    InvalidSigmaBound(f64),
    #[error("Invalid sigma0 initial guess: {guess} (must be 0-{max})")]
    InvalidSigmaGuess { guess: f64, max: f64 },
}
