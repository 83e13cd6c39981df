//! Dataset Builder
//!
//! Fetches price histories for a list of tickers, aggregates each one on the
//! blocking pool and concatenates the per-instrument tables.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::analysis::WindowAggregator;
use crate::domain::StatisticsTable;
use crate::ports::PriceSource;

/// Outcome of a dataset build
#[derive(Debug, Clone, Default)]
pub struct DatasetBuild {
    pub table: StatisticsTable,
    /// Tickers that contributed at least one window
    pub built: Vec<String>,
    /// Tickers with no data, no usable windows or a failed fetch
    pub skipped: Vec<String>,
}

/// Per-ticker result, tagged with its position in the request
type TickerOutcome = (usize, String, Option<StatisticsTable>);

pub struct DatasetBuilder {
    source: Arc<dyn PriceSource>,
    aggregator: Arc<WindowAggregator>,
    max_concurrency: usize,
}

impl DatasetBuilder {
    pub fn new(source: Arc<dyn PriceSource>, aggregator: WindowAggregator) -> Self {
        Self {
            source,
            aggregator: Arc::new(aggregator),
            max_concurrency: 8,
        }
    }

    /// Limit the number of tickers processed at once
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Build the table for `tickers`
    ///
    /// Per-ticker failures are logged and skipped. Rows are concatenated in
    /// request order regardless of completion order.
    pub async fn build(&self, tickers: &[String]) -> Result<DatasetBuild> {
        tracing::info!(
            "Building dataset for {} tickers from {} source",
            tickers.len(),
            self.source.name()
        );

        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks: JoinSet<Result<TickerOutcome>> = JoinSet::new();

        for (index, ticker) in tickers.iter().enumerate() {
            let source = Arc::clone(&self.source);
            let aggregator = Arc::clone(&self.aggregator);
            let permits = Arc::clone(&permits);
            let ticker = ticker.clone();

            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await?;
                let table = process_ticker(source.as_ref(), aggregator, &ticker).await?;
                Ok((index, ticker, table))
            });
        }

        let mut outcomes = Vec::with_capacity(tickers.len());
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined.context("ticker task panicked")??);
        }
        outcomes.sort_by_key(|(index, _, _)| *index);

        let build = outcomes
            .into_iter()
            .fold(DatasetBuild::default(), |mut acc, (_, ticker, table)| {
                match table {
                    Some(table) => {
                        acc.table = acc.table.merge(table);
                        acc.built.push(ticker);
                    }
                    None => acc.skipped.push(ticker),
                }
                acc
            });

        tracing::info!(
            "Dataset complete: {} rows from {} tickers ({} skipped)",
            build.table.len(),
            build.built.len(),
            build.skipped.len()
        );
        Ok(build)
    }
}

/// Fetch and aggregate one ticker; `None` when it contributes nothing
async fn process_ticker(
    source: &dyn PriceSource,
    aggregator: Arc<WindowAggregator>,
    ticker: &str,
) -> Result<Option<StatisticsTable>> {
    let series = match source.fetch(ticker).await {
        Ok(Some(series)) => series,
        Ok(None) => {
            tracing::warn!("No price data for {}", ticker);
            return Ok(None);
        }
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}", ticker, e);
            return Ok(None);
        }
    };

    let table = tokio::task::spawn_blocking(move || aggregator.aggregate(&series))
        .await
        .with_context(|| format!("aggregation task for {} panicked", ticker))?;

    if table.is_empty() {
        tracing::warn!("{}: no usable windows", ticker);
        return Ok(None);
    }

    tracing::info!("{}: {} clean windows", ticker, table.len());
    Ok(Some(table))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::WindowConfig;
    use crate::domain::{PricePoint, PriceSeries};
    use crate::ports::{MockPriceSource, PriceSourceError};
    use chrono::{Duration, NaiveDate};

    fn series(ticker: &str, len: usize) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let points = (0..len)
            .map(|i| {
                let price = 100.0 * (1.0 + 0.01 * ((i % 7) as f64 - 3.0));
                PricePoint::new(start + Duration::days(i as i64), price)
            })
            .collect();
        PriceSeries::new(ticker, points).unwrap()
    }

    fn aggregator() -> WindowAggregator {
        WindowAggregator::new(WindowConfig::default().with_horizons(vec![5, 10])).unwrap()
    }

    fn mock_source() -> MockPriceSource {
        let mut source = MockPriceSource::new();
        source.expect_name().return_const("mock");
        source.expect_fetch().returning(|ticker| match ticker {
            "AAA" => Ok(Some(series("AAA", 41))),
            "BBB" => Ok(Some(series("BBB", 21))),
            "NODATA" => Ok(None),
            "SHORT" => Ok(Some(series("SHORT", 3))),
            _ => Err(PriceSourceError::Parse("boom".to_string())),
        });
        source
    }

    fn tickers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_build_concatenates_in_request_order() {
        let builder = DatasetBuilder::new(Arc::new(mock_source()), aggregator());

        let build = builder.build(&tickers(&["BBB", "AAA"])).await.unwrap();

        assert_eq!(build.built, vec!["BBB", "AAA"]);
        assert!(build.skipped.is_empty());
        // 20 returns: 4 windows of 5 + 2 of 10; 40 returns: 8 + 4
        assert_eq!(build.table.len(), 6 + 12);
        assert_eq!(build.table.rows()[0].ticker, "BBB");
        assert_eq!(build.table.rows().last().unwrap().ticker, "AAA");
    }

    #[tokio::test]
    async fn test_build_skips_failed_and_empty_tickers() {
        let builder = DatasetBuilder::new(Arc::new(mock_source()), aggregator())
            .with_max_concurrency(1);

        let build = builder
            .build(&tickers(&["NODATA", "AAA", "BROKEN", "SHORT"]))
            .await
            .unwrap();

        assert_eq!(build.built, vec!["AAA"]);
        assert_eq!(build.skipped, vec!["NODATA", "BROKEN", "SHORT"]);
        assert_eq!(build.table.tickers(), vec!["AAA"]);
    }

    #[tokio::test]
    async fn test_build_matches_direct_aggregation() {
        let builder = DatasetBuilder::new(Arc::new(mock_source()), aggregator());
        let build = builder.build(&tickers(&["AAA"])).await.unwrap();

        let direct = aggregator().aggregate(&series("AAA", 41));
        assert_eq!(build.table, direct);
    }

    #[tokio::test]
    async fn test_empty_request() {
        let builder = DatasetBuilder::new(Arc::new(mock_source()), aggregator());
        let build = builder.build(&[]).await.unwrap();
        assert!(build.table.is_empty());
        assert!(build.built.is_empty());
    }
}
