//! Configuration Module
//!
//! Loads and validates configuration from TOML files and the environment.

pub mod loader;

pub use loader::{
    load_config, load_config_with_overrides, load_env_config, load_env_config_with_overrides,
    write_default_config, Config, ConfigError, DataSection, LoggingSection, SourceKind,
    ENV_PREFIX,
};
