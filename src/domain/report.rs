//! Score Reports
//!
//! Structured output of the q-variance scorer. Rendering (JSON, submission
//! metadata) is left to the application layer.

use serde::{Deserialize, Serialize};

use super::stats::GroupKey;

/// How per-scope fits are combined into one verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// One fit per (ticker, horizon); final R² is the arithmetic mean
    #[default]
    PerScope,
    /// All records pooled into a single fit
    Pooled,
}

impl std::fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationMode::PerScope => write!(f, "per-scope"),
            AggregationMode::Pooled => write!(f, "pooled"),
        }
    }
}

/// Identifies the records a fit was computed over
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScopeKey {
    Group { ticker: String, horizon: u32 },
    Global,
}

impl From<GroupKey> for ScopeKey {
    fn from(key: GroupKey) -> Self {
        ScopeKey::Group {
            ticker: key.ticker,
            horizon: key.horizon,
        }
    }
}

impl std::fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeKey::Group { ticker, horizon } => write!(f, "{}/T={}", ticker, horizon),
            ScopeKey::Global => write!(f, "global"),
        }
    }
}

/// Outcome classification of a scored scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeStatus {
    /// Fit converged; R² computed from the fitted curve
    Fitted,
    /// Fewer usable bins than required; scored as zero
    TooFewBins,
    /// Optimizer failed; scored as zero
    NotConverged,
    /// Bin means or the fitted curve were not finite; scored as zero
    NonFinite,
}

/// Fit quality for one scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeScore {
    pub scope: ScopeKey,
    /// Records in the scope, including those outside the binning range
    pub n_points: usize,
    pub usable_bins: usize,
    pub r_squared: f64,
    pub sigma0: Option<f64>,
    pub status: ScopeStatus,
}

/// Scope excluded before fitting because it had too few records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedScope {
    pub scope: ScopeKey,
    pub n_points: usize,
    pub required: usize,
}

/// Aggregated verdict over all scored scopes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub mode: AggregationMode,
    /// Mean per-scope R² (per-scope mode) or the single pooled R²
    pub r_squared: f64,
    /// Records across all scored scopes
    pub n_points: usize,
    /// Pooled fit's σ₀; per-scope values live in `details`
    pub sigma0: Option<f64>,
    pub pass_threshold: f64,
    pub passed: bool,
    pub details: Vec<ScopeScore>,
    pub skipped: Vec<SkippedScope>,
}

impl ScoreReport {
    /// Number of scopes contributing to the score
    pub fn n_scopes(&self) -> usize {
        self.details.len()
    }

    /// Scopes whose fit converged
    pub fn fitted_scopes(&self) -> impl Iterator<Item = &ScopeScore> {
        self.details.iter().filter(|s| s.status == ScopeStatus::Fitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_key_display() {
        let key: ScopeKey = GroupKey::new("AAPL", 20).into();
        assert_eq!(key.to_string(), "AAPL/T=20");
        assert_eq!(ScopeKey::Global.to_string(), "global");
    }

    #[test]
    fn test_mode_serializes_snake_case() {
        let json = serde_json::to_string(&AggregationMode::PerScope).unwrap();
        assert_eq!(json, "\"per_scope\"");
        let mode: AggregationMode = serde_json::from_str("\"pooled\"").unwrap();
        assert_eq!(mode, AggregationMode::Pooled);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ScopeStatus::NonFinite).unwrap();
        assert_eq!(json, "\"non_finite\"");
        let status: ScopeStatus = serde_json::from_str("\"not_converged\"").unwrap();
        assert_eq!(status, ScopeStatus::NotConverged);
    }
}
