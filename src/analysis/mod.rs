//! Analysis Layer - Window Statistics and Q-Variance Scoring
//!
//! The two numerical components of the pipeline:
//! - `WindowAggregator`: price series -> normalized per-window statistics
//! - `QVarianceScorer`: statistics tables -> binned fit of
//!   sigma² = σ₀² + z²/2 and an R²-based verdict
//!
//! Both are pure, synchronous and configured through `AnalysisConfig`.

pub mod params;
pub mod window_aggregator;
pub mod binning;
pub mod qvar_fit;
pub mod scorer;

pub use params::{
    AnalysisConfig, AnchorPolicy, BinSpec, ConfigError, FitTarget, ScoringConfig, WindowConfig,
    WindowPolicy, MAX_BINS,
};
pub use window_aggregator::{HorizonSummary, WindowAggregator};
pub use binning::{Bin, BinAggregate, BinGrid};
pub use qvar_fit::{fit_bins, r_squared, DegenerateReason, FitOutcome, FitResult, FitSettings, QVarModel};
pub use scorer::{QVarianceScorer, ScopeEvaluation};
