//! CLI Adapter
//!
//! Command-line interface for the q-variance toolkit.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{BuildCmd, CliApp, Command, InitCmd, ScoreCmd, SimulateCmd};

use anyhow::Result;

/// Parse the command line
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    commands::execute(app).await
}
