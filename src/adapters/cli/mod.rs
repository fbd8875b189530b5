//! CLI Adapter
//!
//! Command-line interface for the token scout.
//! Uses clap derive macros for argument parsing.

mod commands;
mod wiring;

pub use commands::{init_logging, AnalyzeCmd, CheckConfigCmd, CliApp, Command, RunCmd};
pub use wiring::{build_scout, Scout};

use anyhow::Result;

/// Initialize the CLI application
pub fn init() -> CliApp {
    use clap::Parser;
    CliApp::parse()
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    commands::execute(app).await
}
