//! Configuration Loader
//!
//! Loads and validates configuration from TOML files matching config.example.toml.
//! Every section and field has a default, so an empty file is a valid
//! starting point; secrets come from the environment.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::adapters::provider::{RateLimitRule, RetryPolicy};
use crate::application::AggregatorConfig;
use crate::domain::{AlertConfig, BlacklistPolicy, FilterCriteria, ScoringConfig};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub aggregator: AggregatorSection,
    #[serde(default)]
    pub filters: FilterCriteria,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub blacklist: BlacklistSection,
    #[serde(default)]
    pub providers: ProvidersSection,
    #[serde(default)]
    pub storage: StorageSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

/// Scheduler configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct AggregatorSection {
    /// Seconds between runs
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Candidates analyzed per run
    #[serde(default = "default_max_tokens_per_run")]
    pub max_tokens_per_run: usize,
    /// Addresses requested from discovery per run
    #[serde(default = "default_discovery_limit")]
    pub discovery_limit: usize,
    /// Tokens analyzed concurrently
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Hard deadline for one run, in seconds
    #[serde(default = "default_run_timeout_secs")]
    pub run_timeout_secs: u64,
    /// Finalized runs kept in memory
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    /// Processed-set capacity (LRU)
    #[serde(default = "default_processed_capacity")]
    pub processed_capacity: usize,
    /// Seconds before a processed token is eligible again
    #[serde(default = "default_processed_ttl_secs")]
    pub processed_ttl_secs: u64,
    /// Analysis cache TTL in seconds (defaults to the interval)
    #[serde(default)]
    pub analysis_cache_ttl_secs: Option<u64>,
    /// Event channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_interval_secs() -> u64 {
    300
}

fn default_max_tokens_per_run() -> usize {
    50
}

fn default_discovery_limit() -> usize {
    200
}

fn default_max_concurrent() -> usize {
    5
}

fn default_run_timeout_secs() -> u64 {
    240
}

fn default_history_size() -> usize {
    50
}

fn default_processed_capacity() -> usize {
    10_000
}

fn default_processed_ttl_secs() -> u64 {
    3600
}

fn default_event_capacity() -> usize {
    crate::application::DEFAULT_EVENT_CAPACITY
}

impl Default for AggregatorSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_tokens_per_run: default_max_tokens_per_run(),
            discovery_limit: default_discovery_limit(),
            max_concurrent: default_max_concurrent(),
            run_timeout_secs: default_run_timeout_secs(),
            history_size: default_history_size(),
            processed_capacity: default_processed_capacity(),
            processed_ttl_secs: default_processed_ttl_secs(),
            analysis_cache_ttl_secs: None,
            event_capacity: default_event_capacity(),
        }
    }
}

impl AggregatorSection {
    pub fn analysis_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.analysis_cache_ttl_secs.unwrap_or(self.interval_secs))
    }
}

/// Blacklist configuration section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlacklistSection {
    /// Addresses blacklisted at startup
    #[serde(default)]
    pub addresses: Vec<BlacklistSeed>,
    /// Auto-blacklist rules for failed tokens
    #[serde(default)]
    pub policy: BlacklistPolicy,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlacklistSeed {
    pub address: String,
    #[serde(default = "default_seed_reason")]
    pub reason: String,
}

fn default_seed_reason() -> String {
    "Listed in configuration".to_string()
}

/// HTTP, retry and rate-limit settings shared by every provider
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSection {
    /// Override the provider's public base URL
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Total attempts per fetch, including the first
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Requests allowed per window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    /// Longest wait for a slot before giving up
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// Raw response cache TTL in seconds (0 disables)
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

fn default_max_requests() -> u32 {
    60
}

fn default_window_ms() -> u64 {
    60_000
}

fn default_max_wait_ms() -> u64 {
    30_000
}

fn default_cache_ttl_secs() -> u64 {
    60
}

impl Default for ProviderSection {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key: None,
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_requests: default_max_requests(),
            window_ms: default_window_ms(),
            max_wait_ms: default_max_wait_ms(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

impl ProviderSection {
    /// Configured base URL, or `fallback`
    pub fn base_url_or(&self, fallback: &str) -> String {
        match self.base_url {
            Some(ref url) if !url.is_empty() => url.clone(),
            _ => fallback.to_string(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    pub fn rate_limit_rule(&self) -> RateLimitRule {
        RateLimitRule::new(
            self.max_requests,
            Duration::from_millis(self.window_ms),
            Duration::from_millis(self.max_wait_ms),
        )
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        (self.cache_ttl_secs > 0).then(|| Duration::from_secs(self.cache_ttl_secs))
    }

    fn validate(&self, name: &str) -> Result<(), ConfigError> {
        if self.max_requests == 0 {
            return Err(ConfigError::ValidationError(format!(
                "providers.{}.max_requests must be > 0",
                name
            )));
        }
        if self.window_ms == 0 {
            return Err(ConfigError::ValidationError(format!(
                "providers.{}.window_ms must be > 0",
                name
            )));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::ValidationError(format!(
                "providers.{}.max_retries must be >= 1 (it counts the first attempt)",
                name
            )));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::ValidationError(format!(
                "providers.{}.timeout_ms must be > 0",
                name
            )));
        }
        if let Some(ref url) = self.base_url {
            if !url.is_empty() && !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(ConfigError::ValidationError(format!(
                    "providers.{}.base_url must be an http(s) URL, got {}",
                    name, url
                )));
            }
        }
        Ok(())
    }
}

/// Discovery feed section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DiscoverySection {
    #[serde(flatten)]
    pub http: ProviderSection,
    /// Also pull boosted tokens
    #[serde(default)]
    pub include_boosts: bool,
}

/// Routing (Jupiter quote) section
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingSection {
    #[serde(flatten)]
    pub http: ProviderSection,
    /// Quote size in lamports
    #[serde(default = "default_probe_amount_lamports")]
    pub probe_amount_lamports: u64,
    /// Slippage tolerance in basis points
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,
}

fn default_probe_amount_lamports() -> u64 {
    100_000_000
}

fn default_slippage_bps() -> u16 {
    100
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            http: ProviderSection::default(),
            probe_amount_lamports: default_probe_amount_lamports(),
            slippage_bps: default_slippage_bps(),
        }
    }
}

impl RoutingSection {
    /// Get API key with environment variable fallback
    /// Checks JUPITER_API_KEY env var if config value is empty/None
    pub fn get_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.http.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var("JUPITER_API_KEY").ok()
    }
}

/// Per-provider sections
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProvidersSection {
    #[serde(default)]
    pub discovery: DiscoverySection,
    #[serde(default)]
    pub market: ProviderSection,
    #[serde(default)]
    pub security: ProviderSection,
    #[serde(default)]
    pub routing: RoutingSection,
    #[serde(default)]
    pub holders: ProviderSection,
}

impl ProvidersSection {
    /// Holder analytics URL with environment variable override
    /// Checks HOLDERS_API_URL env var first, falls back to config value
    pub fn get_holders_url(&self) -> Option<String> {
        std::env::var("HOLDERS_API_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .or_else(|| self.holders.base_url.clone().filter(|url| !url.is_empty()))
    }

    /// Holder analytics API key with environment variable fallback
    pub fn get_holders_api_key(&self) -> Option<String> {
        if let Some(ref key) = self.holders.api_key {
            if !key.is_empty() {
                return Some(key.clone());
            }
        }
        std::env::var("HOLDERS_API_KEY").ok()
    }
}

/// Analysis storage section
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSection {
    /// JSONL file for passing analyses (`~` is expanded)
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Analyses indexed in memory per token
    #[serde(default = "default_history_per_token")]
    pub history_per_token: usize,
}

fn default_storage_path() -> String {
    "~/.butters-scout/analyses.jsonl".to_string()
}

fn default_history_per_token() -> usize {
    crate::adapters::storage::DEFAULT_HISTORY_PER_TOKEN
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
            history_per_token: default_history_per_token(),
        }
    }
}

impl StorageSection {
    /// Get storage path with environment variable override and `~` expanded
    /// Checks SCOUT_STORAGE_PATH env var first, falls back to config value
    pub fn get_path(&self) -> String {
        let raw = std::env::var("SCOUT_STORAGE_PATH").unwrap_or_else(|_| self.path.clone());
        shellexpand::tilde(&raw).to_string()
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        AggregatorConfig::from(self)
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

        if self.aggregator.processed_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "processed_capacity must be > 0".to_string(),
            ));
        }

        if self.aggregator.event_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "event_capacity must be > 0".to_string(),
            ));
        }

        if self.aggregator.run_timeout_secs > self.aggregator.interval_secs {
            tracing::warn!(
                "run_timeout_secs ({}) exceeds interval_secs ({}); later ticks will be skipped",
                self.aggregator.run_timeout_secs,
                self.aggregator.interval_secs
            );
        }

        if self.scoring.safety_multiplier < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "safety_multiplier must be >= 0, got {}",
                self.scoring.safety_multiplier
            )));
        }

        self.providers.discovery.http.validate("discovery")?;
        self.providers.market.validate("market")?;
        self.providers.security.validate("security")?;
        self.providers.routing.http.validate("routing")?;
        self.providers.holders.validate("holders")?;

        if self.providers.routing.probe_amount_lamports == 0 {
            return Err(ConfigError::ValidationError(
                "providers.routing.probe_amount_lamports must be > 0".to_string(),
            ));
        }

        if self.storage.path.is_empty() {
            return Err(ConfigError::ValidationError(
                "storage.path cannot be empty".to_string(),
            ));
        }

        let level = self.logging.level.to_lowercase();
        if !["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "logging.level must be one of trace/debug/info/warn/error, got {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Blacklist seeds as (address, reason) pairs
    pub fn blacklist_seeds(&self) -> Vec<(String, String)> {
        self.blacklist
            .addresses
            .iter()
            .map(|seed| (seed.address.clone(), seed.reason.clone()))
            .collect()
    }
}

// Conversion from Config to the scheduler's runtime settings
impl From<&Config> for AggregatorConfig {
    fn from(config: &Config) -> Self {
        let section = &config.aggregator;
        AggregatorConfig {
            interval: Duration::from_secs(section.interval_secs),
            max_tokens_per_run: section.max_tokens_per_run,
            discovery_limit: section.discovery_limit,
            max_concurrent: section.max_concurrent,
            run_timeout: Duration::from_secs(section.run_timeout_secs),
            history_size: section.history_size,
            processed_capacity: section.processed_capacity,
            processed_ttl: Duration::from_secs(section.processed_ttl_secs),
            criteria: config.filters.clone(),
            alerts: config.alerts.clone(),
            blacklist_policy: config.blacklist.policy.clone(),
        }
    }
}
