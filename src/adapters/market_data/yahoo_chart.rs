use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::domain::{PricePoint, PriceSeries};
use crate::ports::{PriceSource, PriceSourceError};

const YAHOO_CHART_API: &str = "https://query1.finance.yahoo.com/v8/finance/chart";

/// Daily adjusted closes from the Yahoo Finance chart endpoint
#[derive(Debug, Clone)]
pub struct YahooChartClient {
    http: Client,
    base_url: String,
}

impl YahooChartClient {
    pub fn new() -> Result<Self, PriceSourceError> {
        Self::with_base_url(YAHOO_CHART_API)
    }

    /// Point the client at a different chart endpoint
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, PriceSourceError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("qvariance/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    fn chart_url(&self, ticker: &str) -> String {
        format!(
            "{}/{}?range=max&interval=1d&events=div%2Csplit",
            self.base_url, ticker
        )
    }
}

#[async_trait]
impl PriceSource for YahooChartClient {
    async fn fetch(&self, ticker: &str) -> Result<Option<PriceSeries>, PriceSourceError> {
        let response = self.http.get(self.chart_url(ticker)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!("Yahoo chart API has no data for {}", ticker);
            return Ok(None);
        }

        let body: ChartResponse = response.error_for_status()?.json().await?;
        parse_chart(ticker, body)
    }

    fn name(&self) -> &'static str {
        "yahoo"
    }
}

/// Convert a chart payload into a price series
///
/// Prefers adjusted closes and falls back to raw closes. Null or
/// non-positive entries are dropped. Dates are exchange-local.
fn parse_chart(ticker: &str, body: ChartResponse) -> Result<Option<PriceSeries>, PriceSourceError> {
    if let Some(error) = body.chart.error {
        return Err(PriceSourceError::Parse(format!(
            "{}: {}",
            error.code, error.description
        )));
    }

    let Some(result) = body.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(None);
    };
    let timestamps = result.timestamp.unwrap_or_default();
    if timestamps.is_empty() {
        return Ok(None);
    }

    let closes = result
        .indicators
        .adjclose
        .and_then(|a| a.into_iter().next())
        .map(|a| a.adjclose)
        .or_else(|| result.indicators.quote.into_iter().next().map(|q| q.close))
        .ok_or_else(|| PriceSourceError::Parse(format!("{}: no close series", ticker)))?;

    if closes.len() != timestamps.len() {
        return Err(PriceSourceError::Parse(format!(
            "{}: {} timestamps but {} closes",
            ticker,
            timestamps.len(),
            closes.len()
        )));
    }

    let offset = result.meta.map(|m| m.gmtoffset).unwrap_or(0);
    let points: Vec<PricePoint> = timestamps
        .into_iter()
        .zip(closes)
        .filter_map(|(ts, close)| {
            let date = DateTime::from_timestamp(ts + offset, 0)?.date_naive();
            Some(PricePoint::new(date, close?))
        })
        .collect();

    let series = PriceSeries::from_unsorted(ticker, points);
    if series.is_empty() {
        return Ok(None);
    }
    Ok(Some(series))
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(default)]
    gmtoffset: i64,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}
