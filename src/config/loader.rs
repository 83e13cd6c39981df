//! Configuration Loader
//!
//! Reads a TOML file, overlays `QVAR__SECTION__KEY` environment variables
//! and validates the result.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ::config::{Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::{AnalysisConfig, ScoringConfig, WindowConfig};

/// Prefix of environment overrides, e.g. `QVAR__SCORING__PASS_THRESHOLD=0.9`
pub const ENV_PREFIX: &str = "QVAR";

/// Main configuration structure matching qvariance.toml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub windows: WindowConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Where prices come from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    #[default]
    Yahoo,
    Csv,
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    /// Tickers to build the dataset from
    pub tickers: Vec<String>,
    pub source: SourceKind,
    /// Directory holding `<TICKER>.csv` files when `source = "csv"`
    pub csv_dir: String,
    pub date_column: String,
    pub price_column: String,
    /// Directory the dataset tables are written to
    pub output_dir: String,
    /// File name stem of the dataset tables
    pub output_stem: String,
    /// Number of files the dataset is split into
    pub output_parts: usize,
    /// Instruments aggregated concurrently
    pub max_concurrency: usize,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            tickers: vec!["^GSPC".to_string()],
            source: SourceKind::Yahoo,
            csv_dir: "data/prices".to_string(),
            date_column: "Date".to_string(),
            price_column: "Price".to_string(),
            output_dir: "data".to_string(),
            output_stem: "dataset".to_string(),
            output_parts: 1,
            max_concurrency: 8,
        }
    }
}

impl DataSection {
    /// CSV price directory with `~` expanded
    pub fn csv_dir_path(&self) -> PathBuf {
        expand(&self.csv_dir)
    }

    /// Output directory with `~` expanded
    pub fn output_dir_path(&self) -> PathBuf {
        expand(&self.output_dir)
    }
}

fn expand(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Logging configuration section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Default filter when neither RUST_LOG nor a CLI flag is given
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    SourceError(#[from] ::config::ConfigError),
    #[error("Failed to write config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to render TOML: {0}")]
    RenderError(#[from] toml::ser::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Invalid analysis parameters: {0}")]
    Analysis(#[from] crate::analysis::ConfigError),
}

/// Load configuration from a TOML file plus `QVAR__*` environment overrides
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    build(Some(path.as_ref()), environment())
}

/// Load with an explicit override map in place of the process environment
pub fn load_config_with_overrides<P: AsRef<Path>>(
    path: P,
    overrides: HashMap<String, String>,
) -> Result<Config, ConfigError> {
    build(Some(path.as_ref()), environment().source(Some(overrides)))
}

/// Defaults plus `QVAR__*` environment overrides, without a file
pub fn load_env_config() -> Result<Config, ConfigError> {
    build(None, environment())
}

/// Defaults plus an explicit override map, without a file
pub fn load_env_config_with_overrides(overrides: HashMap<String, String>) -> Result<Config, ConfigError> {
    build(None, environment().source(Some(overrides)))
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("data.tickers")
        .with_list_parse_key("windows.horizons")
}

fn build(path: Option<&Path>, env: Environment) -> Result<Config, ConfigError> {
    let mut builder = ::config::Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml));
    }
    let config: Config = builder.add_source(env).build()?.try_deserialize()?;
    config.validate()?;
    Ok(config)
}

/// Write the default configuration as TOML
pub fn write_default_config<P: AsRef<Path>>(path: P) -> Result<(), ConfigError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, toml::to_string_pretty(&Config::default())?)?;
    Ok(())
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.tickers.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "tickers cannot contain empty names".to_string(),
            ));
        }

        if self.data.output_stem.is_empty() {
            return Err(ConfigError::ValidationError(
                "output_stem cannot be empty".to_string(),
            ));
        }

        if self.data.output_parts == 0 {
            return Err(ConfigError::ValidationError(format!(
                "output_parts must be > 0, got {}",
                self.data.output_parts
            )));
        }

        if self.data.max_concurrency == 0 {
            return Err(ConfigError::ValidationError(format!(
                "max_concurrency must be > 0, got {}",
                self.data.max_concurrency
            )));
        }

        if self.data.source == SourceKind::Csv && self.data.csv_dir.is_empty() {
            return Err(ConfigError::ValidationError(
                "csv_dir cannot be empty for a csv source".to_string(),
            ));
        }

        AnalysisConfig::from(self).validate()?;
        Ok(())
    }
}

impl From<&Config> for AnalysisConfig {
    fn from(config: &Config) -> Self {
        AnalysisConfig {
            windows: config.windows.clone(),
            scoring: config.scoring.clone(),
        }
    }
}
