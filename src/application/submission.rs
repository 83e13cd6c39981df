//! Submission Rendering
//!
//! Wraps a score report with submission metadata and renders it as
//! rounded, human-readable JSON.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::{AggregationMode, ScopeKey, ScopeStatus, ScoreReport};

const R2_DECIMALS: i32 = 5;
const SIGMA_DECIMALS: i32 = 4;

/// One scored scope as it appears in a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(rename = "T", skip_serializing_if = "Option::is_none")]
    pub horizon: Option<u32>,
    pub n_points: usize,
    pub r2: f64,
    pub sigma0: Option<f64>,
    pub status: ScopeStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub submission: String,
    pub author: String,
    pub date: NaiveDate,
    /// The report's score rounded once; the mean is taken over unrounded
    /// scope values so it always agrees with `passed`
    pub final_r2: f64,
    pub n_combinations: usize,
    pub passed: bool,
    pub mode: AggregationMode,
    pub details: Vec<SubmissionDetail>,
}

impl Submission {
    pub fn from_report(
        name: impl Into<String>,
        author: impl Into<String>,
        date: NaiveDate,
        report: &ScoreReport,
    ) -> Self {
        let details = report
            .details
            .iter()
            .map(|score| {
                let (ticker, horizon) = match &score.scope {
                    ScopeKey::Group { ticker, horizon } => (Some(ticker.clone()), Some(*horizon)),
                    ScopeKey::Global => (None, None),
                };
                SubmissionDetail {
                    ticker,
                    horizon,
                    n_points: score.n_points,
                    r2: round_to(score.r_squared, R2_DECIMALS),
                    sigma0: score.sigma0.map(|s| round_to(s, SIGMA_DECIMALS)),
                    status: score.status,
                }
            })
            .collect();

        Self {
            submission: name.into(),
            author: author.into(),
            date,
            final_r2: round_to(report.r_squared, R2_DECIMALS),
            n_combinations: report.n_scopes(),
            passed: report.passed,
            mode: report.mode,
            details,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize submission")
    }

    /// Write the pretty JSON to `path`, creating parent directories
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_json_pretty()?)
            .with_context(|| format!("failed to write {}", path.display()))
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}
