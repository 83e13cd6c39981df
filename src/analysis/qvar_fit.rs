//! Q-Variance Model Fit
//!
//! Fits the one-parameter q-variance law to binned statistics:
//!
//! - volatility form: sigma(z) = sqrt(σ₀² + z²/2)
//! - variance form:   sigma²(z) = σ₀² + z²/2
//!
//! The fit runs a bounded Levenberg-Marquardt search over a = σ₀², which
//! keeps the Jacobian strictly positive for both forms (the derivative with
//! respect to σ₀ vanishes at σ₀ = 0). Bounds are enforced by projection.
//!
//! Too few bins, non-finite input and non-convergence are ordinary outcomes
//! reported through `FitOutcome::Degenerate`, scored as R² = 0.

use serde::{Deserialize, Serialize};

use crate::analysis::binning::BinAggregate;
use crate::analysis::params::{FitTarget, ScoringConfig};

/// Default iteration cap for the optimizer
pub const DEFAULT_MAX_ITERATIONS: usize = 200;
/// Relative step size below which the search has converged
const STEP_TOLERANCE: f64 = 1e-12;
/// Absolute gradient magnitude below which the search has converged
const GRADIENT_TOLERANCE: f64 = 1e-15;
/// Damping above this means no further descent is possible
const MAX_DAMPING: f64 = 1e16;
/// Floor on model value when forming the volatility-form derivative
const MIN_MODEL_VALUE: f64 = 1e-12;

/// The q-variance law in volatility or variance form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QVarModel {
    target: FitTarget,
}

impl QVarModel {
    pub fn new(target: FitTarget) -> Self {
        Self { target }
    }

    pub fn target(&self) -> FitTarget {
        self.target
    }

    /// Model value at `z` for `a = σ₀²`
    pub fn value(&self, z: f64, a: f64) -> f64 {
        let variance = a + 0.5 * z * z;
        match self.target {
            FitTarget::Volatility => variance.sqrt(),
            FitTarget::Variance => variance,
        }
    }

    /// Derivative of the model value with respect to `a = σ₀²`
    pub fn derivative(&self, z: f64, a: f64) -> f64 {
        match self.target {
            FitTarget::Volatility => 0.5 / self.value(z, a).max(MIN_MODEL_VALUE),
            FitTarget::Variance => 1.0,
        }
    }

    /// Model value at `z` for a given σ₀
    pub fn predict(&self, z: f64, sigma0: f64) -> f64 {
        self.value(z, sigma0 * sigma0)
    }
}

/// Optimizer settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSettings {
    pub sigma0_initial: f64,
    pub sigma0_max: f64,
    pub max_iterations: usize,
}

impl FitSettings {
    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            sigma0_initial: config.sigma0_initial,
            sigma0_max: config.sigma0_max,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl Default for FitSettings {
    fn default() -> Self {
        Self::from_config(&ScoringConfig::default())
    }
}

/// Successful fit over a set of usable bins
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub sigma0: f64,
    /// Model value at each bin's mean z, in bin order
    pub predicted: Vec<f64>,
    pub r_squared: f64,
    pub iterations: usize,
}

/// Why a scope could not be fitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegenerateReason {
    TooFewBins { usable: usize, required: usize },
    NotConverged { iterations: usize },
    NonFinite,
}

/// Either a fitted curve or a zero-scored degenerate result
#[derive(Debug, Clone, PartialEq)]
pub enum FitOutcome {
    Fitted(FitResult),
    Degenerate(DegenerateReason),
}

impl FitOutcome {
    pub fn r_squared(&self) -> f64 {
        match self {
            FitOutcome::Fitted(fit) => fit.r_squared,
            FitOutcome::Degenerate(_) => 0.0,
        }
    }

    pub fn sigma0(&self) -> Option<f64> {
        match self {
            FitOutcome::Fitted(fit) => Some(fit.sigma0),
            FitOutcome::Degenerate(_) => None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self, FitOutcome::Fitted(_))
    }
}

/// Coefficient of determination `1 - SS_res / SS_tot`
///
/// Returns 0 when the observations carry no variance (SS_tot is zero up to
/// rounding) or the inputs are empty or mismatched.
pub fn r_squared(observed: &[f64], predicted: &[f64]) -> f64 {
    if observed.is_empty() || observed.len() != predicted.len() {
        return 0.0;
    }
    let n = observed.len() as f64;
    let mean = observed.iter().sum::<f64>() / n;

    let ss_tot: f64 = observed.iter().map(|y| (y - mean).powi(2)).sum();
    let scale: f64 = observed.iter().map(|y| y * y).sum();
    if !ss_tot.is_finite() || ss_tot <= f64::EPSILON * scale {
        return 0.0;
    }

    let ss_res: f64 = observed
        .iter()
        .zip(predicted)
        .map(|(y, p)| (y - p).powi(2))
        .sum();

    1.0 - ss_res / ss_tot
}

/// Fit σ₀ to usable bins and score the fit
///
/// `min_bins` below the usable-bin count short-circuits to
/// `DegenerateReason::TooFewBins` without attempting a fit.
pub fn fit_bins(
    bins: &[BinAggregate],
    model: QVarModel,
    settings: &FitSettings,
    min_bins: usize,
) -> FitOutcome {
    if bins.len() < min_bins.max(1) {
        return FitOutcome::Degenerate(DegenerateReason::TooFewBins {
            usable: bins.len(),
            required: min_bins,
        });
    }

    let z: Vec<f64> = bins.iter().map(|b| b.mean_z).collect();
    let observed: Vec<f64> = bins.iter().map(|b| b.mean_target).collect();
    if z.iter().chain(&observed).any(|v| !v.is_finite()) {
        return FitOutcome::Degenerate(DegenerateReason::NonFinite);
    }

    match least_squares(&z, &observed, model, settings) {
        Ok((sigma0, iterations)) => {
            let predicted: Vec<f64> = z.iter().map(|&zi| model.predict(zi, sigma0)).collect();
            let r2 = r_squared(&observed, &predicted);
            if !r2.is_finite() {
                return FitOutcome::Degenerate(DegenerateReason::NonFinite);
            }
            FitOutcome::Fitted(FitResult {
                sigma0,
                predicted,
                r_squared: r2,
                iterations,
            })
        }
        Err(reason) => FitOutcome::Degenerate(reason),
    }
}

/// Projected Levenberg-Marquardt over `a = σ₀²` in `[0, σ₀_max²]`
///
/// Returns the fitted σ₀ and the number of iterations used.
fn least_squares(
    z: &[f64],
    observed: &[f64],
    model: QVarModel,
    settings: &FitSettings,
) -> Result<(f64, usize), DegenerateReason> {
    let upper = settings.sigma0_max * settings.sigma0_max;
    let cost = |a: f64| -> f64 {
        z.iter()
            .zip(observed)
            .map(|(&zi, &yi)| (yi - model.value(zi, a)).powi(2))
            .sum()
    };

    let mut a = (settings.sigma0_initial * settings.sigma0_initial).clamp(0.0, upper);
    let mut current = cost(a);
    if !current.is_finite() {
        return Err(DegenerateReason::NonFinite);
    }
    let mut damping = 1e-3;

    for iteration in 1..=settings.max_iterations {
        let (jtj, jtr) = z.iter().zip(observed).fold((0.0, 0.0), |(jtj, jtr), (&zi, &yi)| {
            let j = model.derivative(zi, a);
            (jtj + j * j, jtr + j * (yi - model.value(zi, a)))
        });
        if !(jtj.is_finite() && jtr.is_finite()) || jtj <= 0.0 {
            return Err(DegenerateReason::NonFinite);
        }

        // stationary, or pressing against an active bound
        let pinned_low = a <= 0.0 && jtr <= 0.0;
        let pinned_high = a >= upper && jtr >= 0.0;
        if jtr.abs() <= GRADIENT_TOLERANCE || pinned_low || pinned_high {
            return Ok((a.sqrt(), iteration));
        }

        let step = loop {
            let candidate = (a + jtr / (jtj * (1.0 + damping))).clamp(0.0, upper);
            let candidate_cost = cost(candidate);
            if candidate_cost.is_finite() && candidate_cost <= current {
                damping = (damping / 10.0).max(1e-12);
                let step = (candidate - a).abs();
                a = candidate;
                current = candidate_cost;
                break Some(step);
            }
            damping *= 10.0;
            if damping > MAX_DAMPING {
                break None;
            }
        };

        match step {
            Some(step) if step > STEP_TOLERANCE * (STEP_TOLERANCE + a) => {}
            _ => return Ok((a.sqrt(), iteration)),
        }
    }

    Err(DegenerateReason::NotConverged {
        iterations: settings.max_iterations,
    })
}
