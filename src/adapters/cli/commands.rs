//! CLI Command Handlers
//!
//! Implementation of all CLI commands for the token scout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use super::wiring::build_scout;
use crate::adapters::notify::LogNotifier;
use crate::application::AggregatorStats;
use crate::config::{load_config, Config};
use crate::domain::{AggregationRun, CombinedAnalysis, Stage};

/// Butters Scout - new-token discovery and analysis for Solana
#[derive(Parser, Debug)]
#[command(
    name = "butters-scout",
    version = env!("CARGO_PKG_VERSION"),
    about = "New-token discovery and analysis for Solana",
    long_about = "Butters Scout polls a discovery feed for new Solana tokens, fans each one \
                  out to market, security, routing and holder providers, scores and filters \
                  the results, and persists the tokens that pass."
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
    /// Start the scheduled aggregation loop
    Run(RunCmd),

    /// Analyze a single token address
    Analyze(AnalyzeCmd),

    /// Load and validate a configuration file
    CheckConfig(CheckConfigCmd),
}

/// Start the aggregation loop
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: PathBuf,

    /// Execute a single run and exit
    #[arg(long)]
    pub once: bool,

    /// Keep analyses in memory instead of the JSONL store
    #[arg(long)]
    pub dry_run: bool,
}

/// Analyze one token
#[derive(Parser, Debug)]
pub struct AnalyzeCmd {
    /// Token mint address
    #[arg(value_name = "ADDRESS")]
    pub address: String,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: PathBuf,

    /// Print the full analysis as JSON
    #[arg(long)]
    pub json: bool,
}

/// Validate configuration
#[derive(Parser, Debug)]
pub struct CheckConfigCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    pub config: PathBuf,
}

/// Dispatch a parsed command line
pub async fn execute(app: CliApp) -> Result<()> {
    match app.command {
        Command::Run(cmd) => run_command(cmd, app.verbose, app.debug).await,
        Command::Analyze(cmd) => analyze_command(cmd, app.verbose, app.debug).await,
        Command::CheckConfig(cmd) => check_config_command(cmd, app.verbose, app.debug),
    }
}

/// Flags win over `RUST_LOG`, which wins over the configured level
pub fn init_logging(verbose: bool, debug: bool, configured: &str) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
    };

    fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    Ok(())
}

fn load(path: &Path, verbose: bool, debug: bool) -> Result<Config> {
    let config = load_config(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    init_logging(verbose, debug, &config.logging.level)?;
    Ok(config)
}

async fn run_command(cmd: RunCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = load(&cmd.config, verbose, debug)?;
    tracing::info!("Starting Butters Scout...");

    let scout = build_scout(&config, cmd.dry_run).await?;
    let forwarder = scout.events.spawn_forwarder(Arc::new(LogNotifier::new()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweepers = scout.spawn_sweepers(shutdown_rx.clone());

    if cmd.once {
        let run = scout
            .aggregator
            .run_once()
            .await
            .context("Aggregation run failed to start")?;
        print_run(&run);
    } else {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received shutdown signal, finishing current run...");
                let _ = shutdown_tx.send(true);
            }
        });

        tracing::info!(
            "Aggregating every {}s (max {} tokens per run)",
            config.aggregator.interval_secs,
            config.aggregator.max_tokens_per_run
        );
        Arc::clone(&scout.aggregator)
            .run_loop(shutdown_rx)
            .await;
    }

    print_stats(&scout.aggregator.stats());

    for sweeper in sweepers {
        sweeper.abort();
    }
    forwarder.abort();
    Ok(())
}

async fn analyze_command(cmd: AnalyzeCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = load(&cmd.config, verbose, debug)?;
    let scout = build_scout(&config, true).await?;

    let analysis = scout
        .aggregator
        .analyze(&cmd.address)
        .await
        .with_context(|| format!("Failed to analyze {}", cmd.address))?;

    if cmd.json {
        let json = serde_json::to_string_pretty(&analysis).context("Failed to serialize analysis")?;
        println!("{}", json);
    } else {
        print_analysis(&analysis);
    }
    Ok(())
}

fn check_config_command(cmd: CheckConfigCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = load(&cmd.config, verbose, debug)?;
    let providers = &config.providers;

    println!("Configuration OK: {}", cmd.config.display());
    println!();
    println!("Aggregator:");
    println!("  Interval:          {}s", config.aggregator.interval_secs);
    println!("  Max tokens/run:    {}", config.aggregator.max_tokens_per_run);
    println!("  Max concurrent:    {}", config.aggregator.max_concurrent);
    println!("  Run timeout:       {}s", config.aggregator.run_timeout_secs);
    println!();
    println!("Filters:");
    println!("  Min liquidity:     ${:.0}", config.filters.min_liquidity);
    println!("  Min volume:        ${:.0}", config.filters.min_volume);
    println!("  Min safety score:  {:.1}", config.filters.min_safety_score);
    println!("  Max slippage:      {:.1}%", config.filters.max_slippage);
    println!();
    println!("Providers:");
    println!(
        "  Holders endpoint:  {}",
        providers.get_holders_url().unwrap_or_else(|| "NOT SET".to_string())
    );
    println!(
        "  Routing API key:   {}",
        if providers.routing.get_api_key().is_some() { "set" } else { "not set" }
    );
    println!();
    println!("Storage:             {}", config.storage.get_path());
    println!("Blacklist seeds:     {}", config.blacklist.addresses.len());

    if providers.get_holders_url().is_none() {
        bail!("No holder analytics endpoint: set providers.holders.base_url or HOLDERS_API_URL");
    }
    Ok(())
}

fn stage_line<T>(name: &str, stage: &Stage<T>) -> String {
    match stage {
        Stage::Present(result) if result.filtered => format!(
            "  {:<9} FILTERED ({})",
            name,
            result.filter_reason.as_deref().unwrap_or("no reason")
        ),
        Stage::Present(_) => format!("  {:<9} ok", name),
        Stage::Absent(reason) => format!("  {:<9} ABSENT ({:?}: {})", name, reason.kind, reason.message),
    }
}

fn print_analysis(analysis: &CombinedAnalysis) {
    println!("{} ({})", analysis.display_name(), analysis.address);
    println!(
        "Score: {}/100  {}",
        analysis.overall_score,
        if analysis.passed { "PASSED" } else { "FAILED" }
    );
    println!();
    println!("Stages:");
    println!("{}", stage_line("market", &analysis.market));
    println!("{}", stage_line("security", &analysis.security));
    println!("{}", stage_line("routing", &analysis.routing));
    println!("{}", stage_line("holders", &analysis.holders));

    if !analysis.failed_filters.is_empty() {
        println!();
        println!("Failed filters:");
        for reason in &analysis.failed_filters {
            println!("  - {}", reason);
        }
    }
    if !analysis.recommendations.is_empty() {
        println!();
        println!("Recommendations:");
        for rec in &analysis.recommendations {
            println!("  - {}", rec);
        }
    }
}

fn print_run(run: &AggregationRun) {
    println!("Run {} {:?}", run.id, run.status);
    println!("  Discovered: {}", run.tokens_discovered);
    println!("  Processed:  {}", run.tokens_processed);
    println!("  Passed:     {}", run.tokens_passed);
    println!("  Stored:     {}", run.tokens_stored);
    if run.partial_timeout {
        println!("  Run deadline reached before every token finished");
    }
    for error in &run.errors {
        println!("  error: {}", error);
    }
}

fn print_stats(stats: &AggregatorStats) {
    println!();
    println!("Session stats:");
    println!("  Runs:        {} ({} failed)", stats.total_runs, stats.failed_runs);
    println!("  Processed:   {}", stats.tokens_processed);
    println!("  Passed:      {}", stats.tokens_passed);
    println!("  Stored:      {}", stats.tokens_stored);
    println!("  Blacklisted: {}", stats.tokens_blacklisted);
    println!("  Alerts:      {}", stats.alerts_raised);
    println!("  Avg score:   {:.1}", stats.avg_passed_score);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_once_dry_run() {
        let app = CliApp::parse_from(["butters-scout", "run", "--once", "--dry-run"]);
        match app.command {
            Command::Run(cmd) => {
                assert!(cmd.once);
                assert!(cmd.dry_run);
                assert_eq!(cmd.config, PathBuf::from("config.toml"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_analyze_with_global_flags() {
        let app = CliApp::parse_from([
            "butters-scout",
            "analyze",
            "So11111111111111111111111111111111111111112",
            "--json",
            "-v",
        ]);
        assert!(app.verbose);
        match app.command {
            Command::Analyze(cmd) => {
                assert!(cmd.json);
                assert_eq!(cmd.address, "So11111111111111111111111111111111111111112");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_check_config_path() {
        let app = CliApp::parse_from(["butters-scout", "check-config", "-c", "scout.toml"]);
        match app.command {
            Command::CheckConfig(cmd) => assert_eq!(cmd.config, PathBuf::from("scout.toml")),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_stage_line_formats() {
        let absent: Stage<u8> =
            Stage::absent(crate::domain::AbsentKind::Timeout, "timed out");
        assert!(stage_line("routing", &absent).contains("ABSENT"));
        assert!(stage_line("market", &Stage::present(1u8)).ends_with("ok"));
    }
}
