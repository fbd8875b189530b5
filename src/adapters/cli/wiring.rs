//! Service Wiring
//!
//! Builds the concrete provider clients, caches, limiter, store and
//! aggregator from a loaded `Config`. Nothing here is global; every
//! command builds its own set.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::adapters::dexscreener::{self, DexScreenerClient, DexScreenerDiscovery};
use crate::adapters::holders::HolderAnalyticsClient;
use crate::adapters::jupiter::{self, JupiterClient, JupiterConfig};
use crate::adapters::provider::{CacheStore, ProviderHttp, RateLimiter, RawResponse};
use crate::adapters::rugcheck::{self, RugCheckClient};
use crate::adapters::storage::{JsonlAnalysisStore, MemoryAnalysisStore};
use crate::application::{Aggregator, AggregatorConfig, AnalysisPipeline, EventBus, HealthTracker};
use crate::config::{Config, ProviderSection};
use crate::domain::{CombinedAnalysis, ProviderId, ScoringEngine};
use crate::ports::{AnalysisStore, ProviderSet};

/// Default lifetime of raw provider responses
const RAW_CACHE_TTL: Duration = Duration::from_secs(60);

/// How often expired cache entries are swept
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Everything a command needs, wired together
pub struct Scout {
    pub aggregator: Arc<Aggregator>,
    pub events: EventBus,
    pub limiter: Arc<RateLimiter>,
    pub raw_cache: Arc<CacheStore<RawResponse>>,
    pub analysis_cache: Arc<CacheStore<CombinedAnalysis>>,
}

impl Scout {
    /// Start periodic sweeps of both caches
    pub fn spawn_sweepers(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![
            self.raw_cache.spawn_sweeper(SWEEP_INTERVAL, shutdown.clone()),
            self.analysis_cache.spawn_sweeper(SWEEP_INTERVAL, shutdown),
        ]
    }
}

/// Build the full service graph. `dry_run` keeps analyses in memory.
pub async fn build_scout(config: &Config, dry_run: bool) -> Result<Scout> {
    let providers = &config.providers;

    let limiter = Arc::new(
        RateLimiter::new()
            .with_rule(ProviderId::Discovery, providers.discovery.http.rate_limit_rule())
            .with_rule(ProviderId::Market, providers.market.rate_limit_rule())
            .with_rule(ProviderId::Security, providers.security.rate_limit_rule())
            .with_rule(ProviderId::Routing, providers.routing.http.rate_limit_rule())
            .with_rule(ProviderId::Holders, providers.holders.rate_limit_rule()),
    );
    let raw_cache = Arc::new(CacheStore::new("raw", RAW_CACHE_TTL));

    let http_for = |provider: ProviderId, section: &ProviderSection| -> Result<ProviderHttp> {
        let http = ProviderHttp::new(provider, Arc::clone(&limiter), section.retry_policy())
            .with_context(|| format!("Failed to create {} HTTP client", provider))?;
        Ok(match section.cache_ttl() {
            Some(ttl) => http.with_raw_cache(Arc::clone(&raw_cache), ttl),
            None => http,
        })
    };

    let discovery = DexScreenerDiscovery::new(
        providers.discovery.http.base_url_or(dexscreener::DEFAULT_BASE_URL),
        http_for(ProviderId::Discovery, &providers.discovery.http)?,
    )
    .with_boosts(providers.discovery.include_boosts);

    let market = DexScreenerClient::new(
        providers.market.base_url_or(dexscreener::DEFAULT_BASE_URL),
        http_for(ProviderId::Market, &providers.market)?,
    );

    let security = RugCheckClient::new(
        providers.security.base_url_or(rugcheck::DEFAULT_BASE_URL),
        http_for(ProviderId::Security, &providers.security)?,
    );

    let routing = JupiterClient::new(
        JupiterConfig {
            api_base_url: providers.routing.http.base_url_or(jupiter::DEFAULT_BASE_URL),
            api_key: providers.routing.get_api_key(),
            probe_amount_lamports: providers.routing.probe_amount_lamports,
            slippage_bps: providers.routing.slippage_bps,
        },
        http_for(ProviderId::Routing, &providers.routing.http)?,
    );

    let holders_url = providers.get_holders_url().context(
        "No holder analytics endpoint: set providers.holders.base_url or HOLDERS_API_URL",
    )?;
    let holders = HolderAnalyticsClient::new(
        holders_url,
        providers.get_holders_api_key().as_deref(),
        http_for(ProviderId::Holders, &providers.holders)?,
    );

    let events = EventBus::new(config.aggregator.event_capacity);
    let analysis_cache = Arc::new(CacheStore::new(
        "analysis",
        config.aggregator.analysis_cache_ttl(),
    ));
    let pipeline = Arc::new(AnalysisPipeline::new(
        ProviderSet::new(
            Arc::new(market),
            Arc::new(security),
            Arc::new(routing),
            Arc::new(holders),
        ),
        Arc::clone(&analysis_cache),
        ScoringEngine::new(config.scoring.clone()),
        events.clone(),
    )
    .with_health(Arc::new(HealthTracker::new())));

    let store: Arc<dyn AnalysisStore> = if dry_run {
        tracing::warn!("DRY RUN - analyses are kept in memory only");
        Arc::new(MemoryAnalysisStore::new())
    } else {
        let path = config.storage.get_path();
        let store = JsonlAnalysisStore::open(&path, config.storage.history_per_token)
            .await
            .with_context(|| format!("Failed to open analysis store at {}", path))?;
        Arc::new(store)
    };

    let aggregator = Aggregator::new(
        AggregatorConfig::from(config),
        pipeline,
        Arc::new(discovery),
        store,
        events.clone(),
    )
    .context("Failed to create aggregator")?
    .with_limiter(Arc::clone(&limiter));

    let seeded = aggregator.seed_blacklist(config.blacklist_seeds());
    if seeded > 0 {
        tracing::info!("Seeded blacklist with {} addresses", seeded);
    }

    Ok(Scout {
        aggregator: Arc::new(aggregator),
        events,
        limiter,
        raw_cache,
        analysis_cache,
    })
}
