//! Butters Scout - Solana New-Token Aggregator
//!
//! Polls a discovery feed, analyzes every new token and persists the ones
//! that pass the configured filters.

use anyhow::Result;
use clap::Parser;

use butters_scout::adapters::cli::{self, CliApp};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (API keys go here, not in config.toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    cli::execute(app).await
}
