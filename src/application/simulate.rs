//! Synthetic Price Generator
//!
//! Reproducible daily prices with stochastic volatility. Log-volatility
//! follows a discrete Ornstein-Uhlenbeck process:
//!
//!   h(t+1) = phi * h(t) + nu * e1
//!   r(t)   = sigma(t) / sqrt(252) * e2 - sigma(t)² / (2 * 252)
//!
//! with sigma(t) = sigma_bar * exp(h(t)). Dates step over weekends.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand::distributions::Distribution;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use crate::analysis::params::TRADING_DAYS_PER_YEAR;
use crate::domain::{PricePoint, PriceSeries};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    /// Number of prices generated
    pub days: usize,
    pub seed: u64,
    pub start: NaiveDate,
    pub initial_price: f64,
    /// Long-run annualized volatility
    pub sigma_bar: f64,
    /// Daily persistence of log-volatility (0 < phi < 1)
    pub phi: f64,
    /// Daily shock size of log-volatility
    pub nu: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            days: 252 * 20,
            seed: 42,
            start: NaiveDate::from_ymd_opt(2000, 1, 3).unwrap_or_default(),
            initial_price: 100.0,
            sigma_bar: 0.18,
            phi: 0.98,
            nu: 0.12,
        }
    }
}

pub struct PriceSimulator {
    params: SimulationParams,
}

impl PriceSimulator {
    pub fn new(params: SimulationParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Generate a series for `ticker`; identical params give identical output
    pub fn generate(&self, ticker: &str) -> anyhow::Result<PriceSeries> {
        let p = &self.params;
        let shocks = Normal::new(0.0, 1.0)?;
        let mut rng = StdRng::seed_from_u64(p.seed);

        let dt = 1.0 / TRADING_DAYS_PER_YEAR;
        let mut log_vol = 0.0;
        let mut log_price = p.initial_price.ln();
        let mut date = next_weekday(p.start);
        let mut points = Vec::with_capacity(p.days);

        for i in 0..p.days {
            if i > 0 {
                log_vol = p.phi * log_vol + p.nu * shocks.sample(&mut rng);
                let sigma = p.sigma_bar * log_vol.exp();
                log_price += sigma * dt.sqrt() * shocks.sample(&mut rng) - 0.5 * sigma * sigma * dt;
                date = next_weekday(date + Duration::days(1));
            }
            points.push(PricePoint::new(date, log_price.exp()));
        }

        Ok(PriceSeries::new(ticker, points)?)
    }
}

fn next_weekday(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date + Duration::days(2),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}
