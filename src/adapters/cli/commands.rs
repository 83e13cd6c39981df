//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the q-variance toolkit.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::adapters::market_data::{CsvPriceSource, YahooChartClient};
use crate::adapters::storage::CsvTableStore;
use crate::analysis::{QVarianceScorer, WindowAggregator};
use crate::application::{DatasetBuilder, PriceSimulator, SimulationParams, Submission};
use crate::config::{load_config, load_env_config, write_default_config, Config, SourceKind};
use crate::domain::{ScopeStatus, ScoreReport};
use crate::ports::{PriceSource, StatisticsStore};

const DEFAULT_CONFIG: &str = "qvariance.toml";

/// Q-Variance - windowed volatility datasets and scaling-law scoring
#[derive(Parser, Debug)]
#[command(
    name = "qvariance",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Build windowed volatility datasets and score them against the q-variance law",
    long_about = "Turns daily price histories into per-window (z, sigma) statistics and \
                  scores datasets by how well binned volatility follows \
                  sigma² = sigma0² + z²/2."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Build a statistics dataset from price histories
    Build(BuildCmd),

    /// Score one or more dataset files
    Score(ScoreCmd),

    /// Generate a synthetic price file
    Simulate(SimulateCmd),

    /// Write the default configuration file
    Init(InitCmd),
}

/// Build dataset
#[derive(Parser, Debug)]
pub struct BuildCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Override the configured tickers (comma separated)
    #[arg(short, long, value_name = "TICKERS", value_delimiter = ',')]
    pub tickers: Vec<String>,

    /// Read prices from CSV files in this directory instead of the configured source
    #[arg(long, value_name = "DIR")]
    pub csv_dir: Option<PathBuf>,

    /// Override the output directory
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Override the number of output files
    #[arg(long, value_name = "N")]
    pub parts: Option<usize>,
}

/// Score dataset
#[derive(Parser, Debug)]
pub struct ScoreCmd {
    /// Dataset CSV files or directories of them
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<PathBuf>,

    /// Path to configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Pool all records into a single fit
    #[arg(long)]
    pub pooled: bool,

    /// Render a submission with this name
    #[arg(long, value_name = "NAME")]
    pub submission: Option<String>,

    /// Submission author
    #[arg(long, value_name = "AUTHOR", default_value = "anonymous")]
    pub author: String,

    /// Write the submission JSON here instead of stdout
    #[arg(long, value_name = "FILE", requires = "submission")]
    pub output: Option<PathBuf>,
}

/// Generate synthetic prices
#[derive(Parser, Debug)]
pub struct SimulateCmd {
    /// Directory the price file is written to
    #[arg(short, long, value_name = "DIR", default_value = "data/prices")]
    pub output: PathBuf,

    /// Ticker name of the generated file
    #[arg(short, long, default_value = "SIM")]
    pub ticker: String,

    /// Number of daily prices
    #[arg(long, value_name = "DAYS", default_value = "5040")]
    pub days: usize,

    /// Random seed
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// First date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub start: Option<NaiveDate>,
}

/// Write default configuration
#[derive(Parser, Debug)]
pub struct InitCmd {
    /// Destination file
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG)]
    pub output: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    match app.command {
        Command::Build(cmd) => {
            let config = load_config(&cmd.config)
                .with_context(|| format!("Failed to load configuration from {}", cmd.config.display()))?;
            init_logging(app.verbose, app.debug, &config.logging.level)?;
            build_command(cmd, config).await
        }
        Command::Score(cmd) => {
            let config = match &cmd.config {
                Some(path) => load_config(path)
                    .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
                None => load_env_config().context("Failed to load configuration from environment")?,
            };
            init_logging(app.verbose, app.debug, &config.logging.level)?;
            score_command(cmd, config).await
        }
        Command::Simulate(cmd) => {
            init_logging(app.verbose, app.debug, "warn")?;
            simulate_command(cmd).await
        }
        Command::Init(cmd) => {
            init_logging(app.verbose, app.debug, "warn")?;
            init_command(cmd)
        }
    }
}

/// Initialize logging system
///
/// RUST_LOG wins, then `--debug`, then `--verbose`, then the configured level.
fn init_logging(verbose: bool, debug: bool, default_level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        default_level
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    Ok(())
}

/// Handle build command
async fn build_command(cmd: BuildCmd, config: Config) -> Result<()> {
    let mut data = config.data.clone();
    if !cmd.tickers.is_empty() {
        data.tickers = cmd.tickers;
    }
    if let Some(dir) = cmd.csv_dir {
        data.source = SourceKind::Csv;
        data.csv_dir = dir.to_string_lossy().into_owned();
    }
    if data.tickers.is_empty() {
        bail!("No tickers configured; set [data].tickers or pass --tickers");
    }

    let source: Arc<dyn PriceSource> = match data.source {
        SourceKind::Yahoo => {
            Arc::new(YahooChartClient::new().context("Failed to create Yahoo client")?)
        }
        SourceKind::Csv => Arc::new(
            CsvPriceSource::new(data.csv_dir_path())
                .with_columns(&data.date_column, &data.price_column),
        ),
    };

    let aggregator = WindowAggregator::new(config.windows.clone())?;
    let build = DatasetBuilder::new(source, aggregator)
        .with_max_concurrency(data.max_concurrency)
        .build(&data.tickers)
        .await?;

    if build.table.is_empty() {
        bail!("No usable windows for any of {} tickers", data.tickers.len());
    }

    let out_dir = cmd.output.unwrap_or_else(|| data.output_dir_path());
    let parts = cmd.parts.unwrap_or(data.output_parts);
    let paths = CsvTableStore::new()
        .save_split(&build.table, &out_dir, &data.output_stem, parts)
        .context("Failed to write dataset")?;

    println!("Dataset built:");
    println!("  Rows:    {}", build.table.len());
    println!("  Tickers: {} ({} skipped)", build.built.len(), build.skipped.len());
    if !build.skipped.is_empty() {
        println!("  Skipped: {}", build.skipped.join(", "));
    }
    for path in &paths {
        println!("  Wrote:   {}", path.display());
    }

    Ok(())
}

/// Handle score command
async fn score_command(cmd: ScoreCmd, config: Config) -> Result<()> {
    let files = expand_inputs(&cmd.inputs)?;
    let table = CsvTableStore::new()
        .load_all(&files)
        .context("Failed to load dataset")?;
    tracing::info!("Loaded {} rows from {} files", table.len(), files.len());

    let mut scoring = config.scoring.clone();
    if cmd.pooled {
        scoring = scoring.pooled();
    }
    let scorer = QVarianceScorer::new(scoring)?;
    let report = scorer.score(&table);

    print_report(&report);

    if let Some(name) = cmd.submission {
        let submission = Submission::from_report(name, cmd.author, Utc::now().date_naive(), &report);
        match cmd.output {
            Some(path) => {
                submission.write(&path)?;
                println!("\nSubmission written to {}", path.display());
            }
            None => println!("\n{}", submission.to_json_pretty()?),
        }
    }

    Ok(())
}

/// Files are taken as given; directories contribute their `*.csv` files in name order
fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("Failed to read {}", input.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| is_csv(path))
                .collect();
            found.sort();
            if found.is_empty() {
                bail!("No CSV files in {}", input.display());
            }
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn is_csv(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn print_report(report: &ScoreReport) {
    println!("======================================");
    println!("    Q-Variance Score ({})", report.mode);
    println!("======================================");
    println!();
    for score in &report.details {
        let status = match score.status {
            ScopeStatus::Fitted => String::new(),
            ScopeStatus::TooFewBins => format!("  (only {} usable bins)", score.usable_bins),
            ScopeStatus::NotConverged => "  (fit did not converge)".to_string(),
            ScopeStatus::NonFinite => "  (non-finite bin means)".to_string(),
        };
        let sigma0 = score
            .sigma0
            .map(|s| format!("{:.4}", s))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<16} n={:<7} R²={:.5}  σ₀={}{}",
            score.scope.to_string(),
            score.n_points,
            score.r_squared,
            sigma0,
            status
        );
    }
    if !report.skipped.is_empty() {
        println!();
        println!("  Skipped {} scopes with fewer than {} points", report.skipped.len(),
            report.skipped[0].required);
    }
    println!();
    println!("  Scopes:   {}", report.n_scopes());
    println!("  Points:   {}", report.n_points);
    println!("  Final R²: {:.5} (threshold {:.2})", report.r_squared, report.pass_threshold);
    println!("  Verdict:  {}", if report.passed { "PASS" } else { "FAIL" });
    println!("======================================");
}

/// Handle simulate command
async fn simulate_command(cmd: SimulateCmd) -> Result<()> {
    let defaults = SimulationParams::default();
    let params = SimulationParams {
        days: cmd.days,
        seed: cmd.seed,
        start: cmd.start.unwrap_or(defaults.start),
        ..defaults
    };
    if params.days < 2 {
        bail!("--days must be at least 2, got {}", params.days);
    }

    let series = PriceSimulator::new(params).generate(&cmd.ticker)?;
    let path = CsvPriceSource::new(&cmd.output)
        .save(&series)
        .context("Failed to write price file")?;

    tracing::info!("Simulated {} prices for {}", series.len(), cmd.ticker);
    println!("Wrote {} prices to {}", series.len(), path.display());
    Ok(())
}

/// Handle init command
fn init_command(cmd: InitCmd) -> Result<()> {
    if cmd.output.exists() && !cmd.force {
        bail!("{} already exists; use --force to overwrite", cmd.output.display());
    }
    write_default_config(&cmd.output)
        .with_context(|| format!("Failed to write {}", cmd.output.display()))?;
    println!("Wrote default configuration to {}", cmd.output.display());
    Ok(())
}
