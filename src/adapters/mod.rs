//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Provider: shared HTTP client, rate limiter, retry and cache
//! - DexScreener: discovery feed and market data
//! - RugCheck: security reports
//! - Jupiter: routing quotes
//! - Holders: holder distribution analytics
//! - Storage: JSONL and in-memory analysis stores
//! - Notify: event notifier backed by tracing
//! - CLI: Command-line interface handlers

pub mod provider;
pub mod dexscreener;
pub mod rugcheck;
pub mod jupiter;
pub mod holders;
pub mod storage;
pub mod notify;
pub mod cli;

pub use dexscreener::{DexScreenerClient, DexScreenerDiscovery};
pub use rugcheck::RugCheckClient;
pub use jupiter::JupiterClient;
pub use holders::HolderAnalyticsClient;
pub use storage::{JsonlAnalysisStore, MemoryAnalysisStore};
pub use notify::LogNotifier;
pub use cli::CliApp;
