//! Q-Variance Scorer
//!
//! Scores statistics tables against `sigma² = σ₀² + z²/2`:
//!
//! 1. Split records into scopes ((ticker, T) groups, or one pooled scope)
//! 2. Skip scopes with fewer than `min_points_per_scope` records
//! 3. Bin z over the configured range, keep bins with enough members
//! 4. Fit σ₀ and compute R² over the usable bins
//! 5. Per-scope mode averages R² across scored scopes; pooled mode reports
//!    the single global fit
//!
//! Fit failures degrade a scope to R² = 0; they never abort the report.

use tracing::{debug, info};

use crate::analysis::binning::{BinAggregate, BinGrid};
use crate::analysis::params::{ConfigError, ScoringConfig};
use crate::analysis::qvar_fit::{fit_bins, DegenerateReason, FitOutcome, FitSettings, QVarModel};
use crate::domain::{
    AggregationMode, NormalizedWindowStat, ScopeKey, ScopeScore, ScopeStatus, ScoreReport,
    SkippedScope, StatisticsTable,
};

/// Result of evaluating one scope
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeEvaluation {
    Scored(ScopeScore),
    Skipped(SkippedScope),
}

/// Evaluates statistics tables against the q-variance law
#[derive(Debug, Clone)]
pub struct QVarianceScorer {
    config: ScoringConfig,
    grid: BinGrid,
    model: QVarModel,
    settings: FitSettings,
}

impl QVarianceScorer {
    /// Create a scorer, validating the configuration up front
    pub fn new(config: ScoringConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let grid = BinGrid::new(config.z_min, config.z_max, config.bins);
        let model = QVarModel::new(config.target);
        let settings = FitSettings::from_config(&config);
        Ok(Self {
            config,
            grid,
            model,
            settings,
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn mode(&self) -> AggregationMode {
        self.config.aggregation
    }

    /// Score one table
    pub fn score(&self, table: &StatisticsTable) -> ScoreReport {
        match self.config.aggregation {
            AggregationMode::PerScope => self.score_per_scope(table),
            AggregationMode::Pooled => self.score_pooled(table),
        }
    }

    /// Score the concatenation of several tables
    pub fn score_tables<'a, I>(&self, tables: I) -> ScoreReport
    where
        I: IntoIterator<Item = &'a StatisticsTable>,
    {
        let merged = StatisticsTable::concat(tables.into_iter().cloned());
        self.score(&merged)
    }

    fn score_per_scope(&self, table: &StatisticsTable) -> ScoreReport {
        let (details, skipped) = table.groups().into_iter().fold(
            (Vec::new(), Vec::new()),
            |(mut details, mut skipped), (key, rows)| {
                match self.evaluate_scope(key.into(), rows) {
                    ScopeEvaluation::Scored(score) => details.push(score),
                    ScopeEvaluation::Skipped(skip) => skipped.push(skip),
                }
                (details, skipped)
            },
        );

        let r_squared = if details.is_empty() {
            0.0
        } else {
            details.iter().map(|s: &ScopeScore| s.r_squared).sum::<f64>() / details.len() as f64
        };

        self.build_report(r_squared, None, details, skipped)
    }

    fn score_pooled(&self, table: &StatisticsTable) -> ScoreReport {
        let rows: Vec<&NormalizedWindowStat> = table.rows().iter().collect();
        match self.evaluate_scope(ScopeKey::Global, rows) {
            ScopeEvaluation::Scored(score) => {
                let r_squared = score.r_squared;
                let sigma0 = score.sigma0;
                self.build_report(r_squared, sigma0, vec![score], Vec::new())
            }
            ScopeEvaluation::Skipped(skip) => self.build_report(0.0, None, Vec::new(), vec![skip]),
        }
    }

    fn build_report(
        &self,
        r_squared: f64,
        sigma0: Option<f64>,
        details: Vec<ScopeScore>,
        skipped: Vec<SkippedScope>,
    ) -> ScoreReport {
        let n_points: usize = details.iter().map(|s| s.n_points).sum();
        let passed = r_squared >= self.config.pass_threshold;

        info!(
            mode = %self.config.aggregation,
            scopes = details.len(),
            skipped = skipped.len(),
            n_points,
            r_squared,
            passed,
            "q-variance score computed"
        );

        ScoreReport {
            mode: self.config.aggregation,
            r_squared,
            n_points,
            sigma0,
            pass_threshold: self.config.pass_threshold,
            passed,
            details,
            skipped,
        }
    }

    /// Bin, fit and score one scope's records
    pub fn evaluate_scope(&self, scope: ScopeKey, rows: Vec<&NormalizedWindowStat>) -> ScopeEvaluation {
        let n_points = rows.len();
        if n_points < self.config.min_points_per_scope {
            debug!(%scope, n_points, "scope skipped: too few points");
            return ScopeEvaluation::Skipped(SkippedScope {
                scope,
                n_points,
                required: self.config.min_points_per_scope,
            });
        }

        let bins = self.bin_rows(&rows);
        let outcome = fit_bins(&bins, self.model, &self.settings, self.config.min_usable_bins);
        let status = match &outcome {
            FitOutcome::Fitted(_) => ScopeStatus::Fitted,
            FitOutcome::Degenerate(DegenerateReason::TooFewBins { .. }) => ScopeStatus::TooFewBins,
            FitOutcome::Degenerate(DegenerateReason::NotConverged { .. }) => ScopeStatus::NotConverged,
            FitOutcome::Degenerate(DegenerateReason::NonFinite) => ScopeStatus::NonFinite,
        };

        debug!(
            %scope,
            n_points,
            usable_bins = bins.len(),
            sigma0 = ?outcome.sigma0(),
            r_squared = outcome.r_squared(),
            ?status,
            "scope scored"
        );

        ScopeEvaluation::Scored(ScopeScore {
            scope,
            n_points,
            usable_bins: bins.len(),
            r_squared: outcome.r_squared(),
            sigma0: outcome.sigma0(),
            status,
        })
    }

    /// Usable bin aggregates for a set of records
    pub fn bin_rows(&self, rows: &[&NormalizedWindowStat]) -> Vec<BinAggregate> {
        self.grid.aggregate(
            rows.iter().map(|r| (r.z, r.sigma)),
            self.config.target,
            self.config.min_points_per_bin,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::params::{BinSpec, FitTarget};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn row(ticker: &str, horizon: u32, z: f64, sigma: f64) -> NormalizedWindowStat {
        NormalizedWindowStat {
            ticker: ticker.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            horizon,
            z,
            sigma,
            demeaned: true,
        }
    }

    /// Records lying exactly on the q-variance curve, spread across the range
    fn law_rows(ticker: &str, horizon: u32, sigma0: f64, n: usize) -> Vec<NormalizedWindowStat> {
        (0..n)
            .map(|i| {
                let z = -0.49 + 0.98 * i as f64 / (n - 1) as f64;
                row(ticker, horizon, z, (sigma0 * sigma0 + z * z / 2.0).sqrt())
            })
            .collect()
    }

    fn small_config() -> ScoringConfig {
        ScoringConfig::default()
            .with_bins(-0.5, 0.5, BinSpec::Count(10))
            .with_minimums(20, 4, 1)
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = ScoringConfig::default();
        config.pass_threshold = 2.0;
        assert!(matches!(
            QVarianceScorer::new(config),
            Err(ConfigError::InvalidPassThreshold(_))
        ));
    }

    #[test]
    fn test_records_on_curve_pass() {
        let table = StatisticsTable::new(law_rows("A", 5, 0.2, 200));
        let scorer = QVarianceScorer::new(small_config()).unwrap();

        let report = scorer.score(&table);
        assert_eq!(report.mode, AggregationMode::PerScope);
        assert_eq!(report.n_scopes(), 1);
        assert_eq!(report.n_points, 200);
        assert!(report.r_squared > 0.99, "r2 = {}", report.r_squared);
        assert!(report.passed);
        assert_relative_eq!(report.details[0].sigma0.unwrap(), 0.2, epsilon = 0.01);
    }

    #[test]
    fn test_small_scope_skipped_and_excluded_from_mean() {
        let mut rows = law_rows("A", 5, 0.2, 200);
        rows.extend(law_rows("B", 5, 0.2, 10));
        let table = StatisticsTable::new(rows);
        let scorer = QVarianceScorer::new(small_config()).unwrap();

        let report = scorer.score(&table);
        assert_eq!(report.n_scopes(), 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].n_points, 10);
        assert_eq!(report.skipped[0].required, 20);
        assert!(report.r_squared > 0.99);
    }

    #[test]
    fn test_too_few_bins_scores_zero_and_counts() {
        // every record inside a single bin
        let mut rows = law_rows("A", 5, 0.2, 200);
        rows.extend((0..50).map(|_| row("C", 5, 0.01, 0.2)));
        let table = StatisticsTable::new(rows);
        let scorer = QVarianceScorer::new(small_config()).unwrap();

        let report = scorer.score(&table);
        assert_eq!(report.n_scopes(), 2);
        let c = report
            .details
            .iter()
            .find(|s| s.scope == ScopeKey::Group { ticker: "C".into(), horizon: 5 })
            .unwrap();
        assert_eq!(c.status, ScopeStatus::TooFewBins);
        assert_eq!(c.r_squared, 0.0);
        assert!(c.sigma0.is_none());
        assert_eq!(c.usable_bins, 1);

        // mean of ~1.0 and 0.0
        assert!(report.r_squared > 0.49 && report.r_squared < 0.51);
        assert!(!report.passed);
    }

    #[test]
    fn test_non_finite_sigma_reported_as_non_finite() {
        let mut rows = law_rows("A", 5, 0.2, 200);
        let mut broken = law_rows("N", 5, 0.2, 40);
        broken[0].sigma = f64::NAN;
        rows.extend(broken);
        let table = StatisticsTable::new(rows);
        let scorer = QVarianceScorer::new(small_config()).unwrap();

        let report = scorer.score(&table);
        assert_eq!(report.n_scopes(), 2);
        let n = report
            .details
            .iter()
            .find(|s| s.scope == ScopeKey::Group { ticker: "N".into(), horizon: 5 })
            .unwrap();
        assert_eq!(n.status, ScopeStatus::NonFinite);
        assert_eq!(n.r_squared, 0.0);
        assert!(n.sigma0.is_none());
        assert!(report.r_squared.is_finite());
        assert!(report.r_squared > 0.49 && report.r_squared < 0.51);
    }

    #[test]
    fn test_pooled_mode_single_global_scope() {
        let mut rows = law_rows("A", 5, 0.2, 100);
        rows.extend(law_rows("B", 10, 0.2, 100));
        let table = StatisticsTable::new(rows);
        let scorer = QVarianceScorer::new(small_config().pooled()).unwrap();

        let report = scorer.score(&table);
        assert_eq!(report.mode, AggregationMode::Pooled);
        assert_eq!(report.n_scopes(), 1);
        assert_eq!(report.details[0].scope, ScopeKey::Global);
        assert_eq!(report.n_points, 200);
        assert_relative_eq!(report.sigma0.unwrap(), 0.2, epsilon = 0.01);
        assert!(report.passed);
    }

    #[test]
    fn test_pooled_mode_skips_small_table() {
        let table = StatisticsTable::new(law_rows("A", 5, 0.2, 10));
        let scorer = QVarianceScorer::new(small_config().pooled()).unwrap();

        let report = scorer.score(&table);
        assert!(report.details.is_empty());
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.r_squared, 0.0);
        assert!(!report.passed);
    }

    #[test]
    fn test_empty_table_scores_zero() {
        let scorer = QVarianceScorer::new(ScoringConfig::default()).unwrap();
        let report = scorer.score(&StatisticsTable::default());
        assert_eq!(report.r_squared, 0.0);
        assert_eq!(report.n_points, 0);
        assert!(!report.passed);
    }

    #[test]
    fn test_variance_target() {
        let table = StatisticsTable::new(law_rows("A", 5, 0.25, 200));
        let scorer =
            QVarianceScorer::new(small_config().with_target(FitTarget::Variance)).unwrap();

        let report = scorer.score(&table);
        assert!(report.r_squared > 0.99);
        assert_relative_eq!(report.details[0].sigma0.unwrap(), 0.25, epsilon = 0.01);
    }

    #[test]
    fn test_score_tables_concatenates() {
        let a = StatisticsTable::new(law_rows("A", 5, 0.2, 100));
        let b = StatisticsTable::new(law_rows("A", 5, 0.2, 100));
        let scorer = QVarianceScorer::new(small_config()).unwrap();

        let report = scorer.score_tables([&a, &b]);
        assert_eq!(report.n_scopes(), 1);
        assert_eq!(report.n_points, 200);
    }
}
