//! End-to-end tests: price files -> dataset -> CSV tables -> score

use std::sync::Arc;

use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate};
use tempfile::TempDir;

use qvariance::adapters::{CsvPriceSource, CsvTableStore};
use qvariance::analysis::{
    BinSpec, QVarianceScorer, ScoringConfig, WindowAggregator, WindowConfig, WindowPolicy,
};
use qvariance::application::{DatasetBuilder, PriceSimulator, SimulationParams, Submission};
use qvariance::domain::{
    AggregationMode, NormalizedWindowStat, PricePoint, PriceSeries, ScopeKey, ScopeStatus,
    StatisticsTable,
};
use qvariance::ports::StatisticsStore;

fn day(n: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + Duration::days(n)
}

fn constant_series(ticker: &str, len: usize) -> PriceSeries {
    let points = (0..len).map(|i| PricePoint::new(day(i as i64), 50.0)).collect();
    PriceSeries::new(ticker, points).unwrap()
}

fn simulate(dir: &std::path::Path, ticker: &str, seed: u64) {
    let params = SimulationParams {
        days: 252 * 20,
        seed,
        ..SimulationParams::default()
    };
    let series = PriceSimulator::new(params).generate(ticker).unwrap();
    CsvPriceSource::new(dir).save(&series).unwrap();
}

#[tokio::test]
async fn test_simulated_prices_through_full_pipeline() {
    let workspace = TempDir::new().unwrap();
    let prices = workspace.path().join("prices");
    let output = workspace.path().join("data");

    simulate(&prices, "SIMA", 1);
    simulate(&prices, "SIMB", 2);
    simulate(&prices, "SIMC", 3);

    let tickers: Vec<String> = ["SIMA", "SIMB", "SIMC", "MISSING"]
        .iter()
        .map(|s| s.to_string())
        .collect();

    let aggregator = WindowAggregator::new(WindowConfig::default()).unwrap();
    let build = DatasetBuilder::new(Arc::new(CsvPriceSource::new(&prices)), aggregator)
        .with_max_concurrency(2)
        .build(&tickers)
        .await
        .unwrap();

    assert_eq!(build.built, vec!["SIMA", "SIMB", "SIMC"]);
    assert_eq!(build.skipped, vec!["MISSING"]);
    assert_eq!(build.table.tickers(), vec!["SIMA", "SIMB", "SIMC"]);

    // every (ticker, T) group is de-meaned
    for rows in build.table.groups().values() {
        let mean: f64 = rows.iter().map(|r| r.z).sum::<f64>() / rows.len() as f64;
        assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
        assert!(rows.iter().all(|r| r.demeaned && r.sigma > 0.0));
    }

    let store = CsvTableStore::new();
    let paths = store.save_split(&build.table, &output, "dataset", 3).unwrap();
    assert_eq!(paths.len(), 3);
    let loaded = store.load_all(&paths).unwrap();
    assert_eq!(loaded, build.table);

    let scorer = QVarianceScorer::new(ScoringConfig::default()).unwrap();
    let report = scorer.score(&loaded);

    assert_eq!(report.mode, AggregationMode::PerScope);
    assert_eq!(report.n_scopes() + report.skipped.len(), 3 * 26);
    assert!(report.skipped.iter().all(|s| s.n_points < 50));
    assert!(report.details.iter().all(|s| s.n_points >= 50));
    assert!(report.r_squared.is_finite() && report.r_squared <= 1.0);
    assert_eq!(report.passed, report.r_squared >= 0.92);

    let mean: f64 =
        report.details.iter().map(|s| s.r_squared).sum::<f64>() / report.n_scopes() as f64;
    assert_relative_eq!(report.r_squared, mean, epsilon = 1e-12);

    let pooled = QVarianceScorer::new(ScoringConfig::default().pooled())
        .unwrap()
        .score(&loaded);
    assert_eq!(pooled.n_scopes(), 1);
    assert_eq!(pooled.details[0].scope, ScopeKey::Global);
    assert_eq!(pooled.n_points, loaded.len());
    let sigma0 = pooled.sigma0.unwrap();
    assert!(sigma0 > 0.0 && sigma0 <= 0.5);

    let submission = Submission::from_report("sim", "tests", day(0), &report);
    assert_eq!(submission.n_combinations, report.n_scopes());
}

#[tokio::test]
async fn test_scoring_split_files_matches_single_table() {
    let workspace = TempDir::new().unwrap();
    simulate(workspace.path(), "SIM", 11);

    let aggregator = WindowAggregator::new(WindowConfig::default()).unwrap();
    let build = DatasetBuilder::new(Arc::new(CsvPriceSource::new(workspace.path())), aggregator)
        .build(&["SIM".to_string()])
        .await
        .unwrap();

    let store = CsvTableStore::new();
    let parts = store
        .save_split(&build.table, workspace.path(), "dataset", 4)
        .unwrap();
    let tables: Vec<StatisticsTable> = parts.iter().map(|p| store.load(p).unwrap()).collect();

    let scorer = QVarianceScorer::new(ScoringConfig::default()).unwrap();
    assert_eq!(scorer.score_tables(&tables), scorer.score(&build.table));
}

#[tokio::test]
async fn test_constant_prices_produce_no_rows() {
    let workspace = TempDir::new().unwrap();
    let source = CsvPriceSource::new(workspace.path());
    source.save(&constant_series("FLAT", 1000)).unwrap();

    let aggregator = WindowAggregator::new(WindowConfig::default()).unwrap();
    assert!(aggregator.aggregate(&constant_series("FLAT", 1000)).is_empty());

    let build = DatasetBuilder::new(Arc::new(source), aggregator)
        .build(&["FLAT".to_string()])
        .await
        .unwrap();
    assert!(build.table.is_empty());
    assert_eq!(build.skipped, vec!["FLAT"]);
}

#[test]
fn test_single_full_window_is_demeaned_to_zero() {
    let prices = [100.0, 101.0, 99.5, 102.0, 101.0, 103.0];
    let points = prices
        .iter()
        .enumerate()
        .map(|(i, p)| PricePoint::new(day(i as i64), *p))
        .collect();
    let series = PriceSeries::new("ONE", points).unwrap();

    let config = WindowConfig::default()
        .with_horizons(vec![5])
        .with_policy(WindowPolicy::full_windows_only());

    let table = WindowAggregator::new(config.clone()).unwrap().aggregate(&series);
    assert_eq!(table.len(), 1);
    assert_eq!(table.rows()[0].z, 0.0);
    assert!(table.rows()[0].demeaned);
    assert_eq!(table.rows()[0].date, day(5));

    let table = WindowAggregator::new(config.with_min_group_size(2))
        .unwrap()
        .aggregate(&series);
    let expected_z = (103.0f64 / 100.0).ln() / (5.0f64 / 252.0).sqrt();
    assert_relative_eq!(table.rows()[0].z, expected_z, epsilon = 1e-12);
    assert!(!table.rows()[0].demeaned);
}

fn row(ticker: &str, horizon: u32, z: f64, sigma: f64) -> NormalizedWindowStat {
    NormalizedWindowStat {
        ticker: ticker.to_string(),
        date: day(0),
        horizon,
        z,
        sigma,
        demeaned: true,
    }
}

#[test]
fn test_exact_two_bin_fit_recovers_sigma0() {
    let sigma0: f64 = 0.2;
    let model = |z: f64| (sigma0 * sigma0 + z * z / 2.0).sqrt();

    let table: StatisticsTable = (0..10)
        .map(|_| row("EXACT", 5, 0.1, model(0.1)))
        .chain((0..10).map(|_| row("EXACT", 5, 0.3, model(0.3))))
        .collect();

    let config = ScoringConfig::default()
        .with_bins(-0.5, 0.5, BinSpec::Count(10))
        .with_minimums(1, 2, 1);
    let report = QVarianceScorer::new(config).unwrap().score(&table);

    assert_eq!(report.n_scopes(), 1);
    let score = &report.details[0];
    assert_eq!(score.status, ScopeStatus::Fitted);
    assert_eq!(score.usable_bins, 2);
    assert_relative_eq!(score.sigma0.unwrap(), sigma0, epsilon = 1e-6);
    assert_relative_eq!(score.r_squared, 1.0, epsilon = 1e-9);
    assert!(report.passed);
}

#[test]
fn test_small_scope_is_skipped_and_excluded_from_mean() {
    let sigma0: f64 = 0.15;
    let model = |z: f64| (sigma0 * sigma0 + z * z / 2.0).sqrt();

    let z_values = [-0.35, -0.25, -0.15, -0.05, 0.05, 0.15, 0.25, 0.35];
    let mut rows: Vec<NormalizedWindowStat> = z_values
        .iter()
        .flat_map(|&z| (0..5).map(move |_| row("BIG", 5, z, model(z))))
        .collect();
    // three records scoring badly if they were included
    rows.extend([0.1, 0.2, 0.3].iter().map(|&z| row("TINY", 5, z, 5.0)));
    let table = StatisticsTable::new(rows);

    let config = ScoringConfig::default()
        .with_bins(-0.4, 0.4, BinSpec::Width(0.1))
        .with_minimums(10, 4, 1);
    let report = QVarianceScorer::new(config).unwrap().score(&table);

    assert_eq!(report.n_scopes(), 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(
        report.skipped[0].scope,
        ScopeKey::Group {
            ticker: "TINY".to_string(),
            horizon: 5
        }
    );
    assert_eq!(report.skipped[0].n_points, 3);
    assert_eq!(report.n_points, 40);
    assert_relative_eq!(report.r_squared, 1.0, epsilon = 1e-9);
}
