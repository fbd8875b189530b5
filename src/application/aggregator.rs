//! Aggregator Scheduler
//!
//! Drives discover -> dedup -> analyze -> persist on a fixed interval.
//!
//! Each run snapshots the active configuration when it starts, so config
//! updates only ever apply to the next run. A tick that arrives while a run
//! is still going is skipped, never queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::events::{AggregatorEvent, EventBus};
use super::health::HealthStatus;
use super::pipeline::{AnalysisPipeline, PipelineError};
use super::processed::ProcessedSet;
use super::stats::{AggregatorStats, StatsTracker};
use crate::adapters::provider::RateLimiter;
use crate::domain::{
    AggregationRun, AlertConfig, Blacklist, BlacklistEntry, BlacklistPolicy, CombinedAnalysis,
    validate_address, FilterCriteria, RunHistory, RunStatus, TokenCandidate, ValidationError,
};
use crate::ports::{AnalysisStore, DiscoveryFeed};

#[derive(Debug, Error)]
pub enum AggregatorError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ValidationError),
    #[error("A run is already in progress")]
    RunInProgress,
    #[error("Invalid address: {0}")]
    Address(ValidationError),
}

/// Runtime settings for the scheduler
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatorConfig {
    pub interval: Duration,
    /// Candidates analyzed per run
    pub max_tokens_per_run: usize,
    /// Addresses requested from the discovery feed per run
    pub discovery_limit: usize,
    pub max_concurrent: usize,
    pub run_timeout: Duration,
    pub history_size: usize,
    pub processed_capacity: usize,
    pub processed_ttl: Duration,
    pub criteria: FilterCriteria,
    pub alerts: AlertConfig,
    pub blacklist_policy: BlacklistPolicy,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            max_tokens_per_run: 50,
            discovery_limit: 200,
            max_concurrent: 5,
            run_timeout: Duration::from_secs(240),
            history_size: 50,
            processed_capacity: 10_000,
            processed_ttl: Duration::from_secs(3600),
            criteria: FilterCriteria::default(),
            alerts: AlertConfig::default(),
            blacklist_policy: BlacklistPolicy::default(),
        }
    }
}

impl AggregatorConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let positive = [
            ("interval", self.interval.is_zero()),
            ("run_timeout", self.run_timeout.is_zero()),
            ("max_tokens_per_run", self.max_tokens_per_run == 0),
            ("discovery_limit", self.discovery_limit == 0),
            ("max_concurrent", self.max_concurrent == 0),
            ("history_size", self.history_size == 0),
        ];
        for (name, is_zero) in positive {
            if is_zero {
                return Err(ValidationError::InvalidConfig(format!("{} must be > 0", name)));
            }
        }
        self.criteria.validate()?;
        self.alerts.validate()?;
        Ok(())
    }
}

/// Partial update applied between runs. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ConfigUpdate {
    pub interval_secs: Option<u64>,
    pub max_tokens_per_run: Option<usize>,
    pub max_concurrent: Option<usize>,
    pub run_timeout_secs: Option<u64>,
    pub criteria: Option<FilterCriteria>,
    pub alerts: Option<AlertConfig>,
    pub blacklist_policy: Option<BlacklistPolicy>,
}

/// Snapshot for status queries
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub running: bool,
    pub current_run: Option<AggregationRun>,
    pub last_run: Option<AggregationRun>,
    pub processed_tokens: usize,
    pub blacklisted_tokens: usize,
    pub cached_analyses: usize,
    pub config: AggregatorConfig,
}

/// Clears the running flag however the run ends
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct Aggregator {
    pipeline: Arc<AnalysisPipeline>,
    discovery: Arc<dyn DiscoveryFeed>,
    store: Arc<dyn AnalysisStore>,
    events: EventBus,
    limiter: Option<Arc<RateLimiter>>,
    config: RwLock<AggregatorConfig>,
    processed: ProcessedSet,
    blacklist: RwLock<Blacklist>,
    stats: Mutex<StatsTracker>,
    history: Mutex<RunHistory>,
    current_run: Mutex<Option<AggregationRun>>,
    running: AtomicBool,
}

impl Aggregator {
    pub fn new(
        config: AggregatorConfig,
        pipeline: Arc<AnalysisPipeline>,
        discovery: Arc<dyn DiscoveryFeed>,
        store: Arc<dyn AnalysisStore>,
        events: EventBus,
    ) -> Result<Self, AggregatorError> {
        config.validate()?;

        Ok(Self {
            processed: ProcessedSet::new(config.processed_capacity, config.processed_ttl),
            history: Mutex::new(RunHistory::new(config.history_size)),
            pipeline,
            discovery,
            store,
            events,
            limiter: None,
            config: RwLock::new(config),
            blacklist: RwLock::new(Blacklist::new()),
            stats: Mutex::new(StatsTracker::new()),
            current_run: Mutex::new(None),
            running: AtomicBool::new(false),
        })
    }

    /// Builder method to include limiter windows in health reports
    pub fn with_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Add blacklist entries without emitting events (startup seeding).
    /// Malformed addresses are skipped with a warning.
    pub fn seed_blacklist<I, A, R>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (A, R)>,
        A: Into<String>,
        R: Into<String>,
    {
        let mut blacklist = self.blacklist.write();
        entries
            .into_iter()
            .map(|(address, reason)| (address.into(), reason))
            .filter(|(address, _)| match validate_address(address) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Skipping blacklist seed {}: {}", address, e);
                    false
                }
            })
            .map(|(address, reason)| blacklist.add(address, reason))
            .filter(|added| *added)
            .count()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn pipeline(&self) -> &Arc<AnalysisPipeline> {
        &self.pipeline
    }

    pub fn config(&self) -> AggregatorConfig {
        self.config.read().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Analyze a single token with the active criteria, outside of any run
    pub async fn analyze(&self, address: &str) -> Result<CombinedAnalysis, PipelineError> {
        let criteria = self.config.read().criteria.clone();
        self.pipeline.analyze(address, &criteria).await
    }

    /// Execute one full run. Returns the finalized run, or `RunInProgress`
    /// when another run holds the scheduler.
    pub async fn run_once(&self) -> Result<AggregationRun, AggregatorError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Previous run still in progress, skipping this tick");
            return Err(AggregatorError::RunInProgress);
        }
        let _guard = RunGuard(&self.running);

        let config = self.config.read().clone();
        let mut run = AggregationRun::new();
        run.start();
        *self.current_run.lock() = Some(run.clone());

        info!("Run {} started", run.id);
        self.events.emit(AggregatorEvent::RunStart { run_id: run.id });

        let status = self.execute(&config, &mut run).await;
        run.finish(status);

        self.stats.lock().record_run(&run);
        self.history.lock().push(run.clone());
        *self.current_run.lock() = None;

        info!(
            "Run {} {:?} in {}ms: discovered {}, processed {}, passed {}, stored {}, {} errors",
            run.id,
            run.status,
            run.duration_ms().unwrap_or(0),
            run.tokens_discovered,
            run.tokens_processed,
            run.tokens_passed,
            run.tokens_stored,
            run.errors.len()
        );
        self.events.emit(AggregatorEvent::RunComplete(run.clone()));

        Ok(run)
    }

    async fn execute(&self, config: &AggregatorConfig, run: &mut AggregationRun) -> RunStatus {
        let deadline = Instant::now() + config.run_timeout;

        let discovered = match tokio::time::timeout_at(
            deadline,
            self.discovery.candidate_addresses(config.discovery_limit),
        )
        .await
        {
            Ok(Ok(addresses)) => addresses,
            Ok(Err(e)) => {
                error!("Discovery failed: {}", e);
                run.record_error(format!("Discovery failed: {}", e));
                return RunStatus::Failed;
            }
            Err(_) => {
                error!("Discovery did not answer before the run timeout");
                run.partial_timeout = true;
                run.record_error("Discovery timed out");
                return RunStatus::Failed;
            }
        };
        run.tokens_discovered = discovered.len();

        let candidates = self.select_candidates(discovered, config.max_tokens_per_run);
        self.events.emit(AggregatorEvent::TokenDiscovered {
            run_id: run.id,
            discovered: run.tokens_discovered,
            queued: candidates.len(),
        });
        info!(
            "Discovered {} tokens, {} queued for analysis",
            run.tokens_discovered,
            candidates.len()
        );

        let addresses: Vec<String> = candidates.into_iter().map(|c| c.address).collect();
        let outcome = self
            .pipeline
            .process_batch_until(&addresses, &config.criteria, config.max_concurrent, deadline)
            .await;

        for failed in &outcome.failed {
            self.processed.mark(failed.address.clone());
            run.record_error(format!("{}: {}", failed.address, failed.error));
        }
        for address in &outcome.unfinished {
            run.record_error(format!("{}: analysis did not finish before the run timeout", address));
        }

        run.tokens_processed = outcome.completed.len();
        for analysis in &outcome.completed {
            self.processed.mark(analysis.address.clone());
            self.stats.lock().record_analysis(analysis);

            if analysis.passed {
                run.tokens_passed += 1;
                self.handle_passed(config, analysis, run).await;
            } else {
                self.handle_failed(config, analysis);
            }
        }

        if outcome.timed_out() {
            run.partial_timeout = true;
            RunStatus::Failed
        } else {
            RunStatus::Completed
        }
    }

    /// Dedup the feed, cap it, then drop blacklisted and recently processed addresses
    fn select_candidates(&self, discovered: Vec<String>, cap: usize) -> Vec<TokenCandidate> {
        let mut seen = std::collections::HashSet::new();
        let blacklist = self.blacklist.read();

        discovered
            .into_iter()
            .filter(|address| seen.insert(address.clone()))
            .take(cap)
            .filter(|address| {
                if blacklist.contains(address) {
                    debug!("Skipping blacklisted {}", address);
                    return false;
                }
                if self.processed.contains(address) {
                    debug!("Skipping recently processed {}", address);
                    return false;
                }
                true
            })
            .map(TokenCandidate::new)
            .collect()
    }

    async fn handle_passed(
        &self,
        config: &AggregatorConfig,
        analysis: &CombinedAnalysis,
        run: &mut AggregationRun,
    ) {
        let blacklisted = self.blacklist.read().contains(&analysis.address);
        if blacklisted {
            info!("{} passed but was blacklisted during the run, not storing", analysis.address);
            return;
        }

        info!(
            "{} ({}) PASSED with score {}",
            analysis.display_name(),
            analysis.address,
            analysis.overall_score
        );
        self.events.emit(AggregatorEvent::TokenPassed {
            address: analysis.address.clone(),
            score: analysis.overall_score,
        });

        match self.store.store_analysis(analysis).await {
            Ok(()) => {
                run.tokens_stored += 1;
                self.stats.lock().record_stored();
                self.events.emit(AggregatorEvent::TokenStored {
                    address: analysis.address.clone(),
                });
            }
            Err(e) => {
                error!("Failed to store analysis for {}: {}", analysis.address, e);
                run.record_error(format!("{}: persistence failed: {}", analysis.address, e));
            }
        }

        let alerts = config.alerts.evaluate(analysis, Utc::now());
        self.stats.lock().record_alerts(alerts.len());
        for alert in alerts {
            debug!("Alert {:?} for {}: {}", alert.alert_type, alert.token_address, alert.message);
            self.events.emit(AggregatorEvent::AlertRaised(alert));
        }
    }

    fn handle_failed(&self, config: &AggregatorConfig, analysis: &CombinedAnalysis) {
        debug!(
            "{} failed: {}",
            analysis.address,
            analysis.failed_filters.join("; ")
        );
        if let Some(reason) = config.blacklist_policy.verdict(analysis) {
            // analyzed addresses have already passed validation
            self.blacklist_unchecked(&analysis.address, &reason);
        }
    }

    /// Tick every `interval` until `shutdown` flips to true. Runs execute on
    /// their own task so a slow run makes later ticks skip, not pile up.
    pub async fn run_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut period = self.config.read().interval;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<JoinHandle<()>> = None;

        info!("Aggregator started, interval {:?}", period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let this = Arc::clone(&self);
                    let handle = tokio::spawn(async move {
                        match this.run_once().await {
                            Ok(_) | Err(AggregatorError::RunInProgress) => {}
                            Err(e) => error!("Run failed to start: {}", e),
                        }
                    });
                    if in_flight.as_ref().map_or(true, |h| h.is_finished()) {
                        in_flight = Some(handle);
                    }

                    let configured = self.config.read().interval;
                    if configured != period {
                        info!("Interval changed {:?} -> {:?}", period, configured);
                        period = configured;
                        ticker = tokio::time::interval_at(Instant::now() + period, period);
                        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if let Some(handle) = in_flight {
            if !handle.is_finished() {
                info!("Waiting for the current run to finish");
            }
            if let Err(e) = handle.await {
                error!("Run task ended abnormally: {}", e);
            }
        }
        info!("Aggregator stopped");
    }

    pub fn stats(&self) -> AggregatorStats {
        self.stats.lock().snapshot()
    }

    /// Last `n` finalized runs, newest first
    pub fn run_history(&self, n: usize) -> Vec<AggregationRun> {
        self.history.lock().recent(n)
    }

    pub fn system_status(&self) -> SystemStatus {
        SystemStatus {
            running: self.is_running(),
            current_run: self.current_run.lock().clone(),
            last_run: self.history.lock().last().cloned(),
            processed_tokens: self.processed.len(),
            blacklisted_tokens: self.blacklist.read().len(),
            cached_analyses: self.pipeline.cache().len(),
            config: self.config(),
        }
    }

    pub fn health_status(&self) -> HealthStatus {
        self.pipeline.health().status(self.limiter.as_deref())
    }

    /// Validate and apply `update` for the next run. Returns the names of the
    /// fields that changed.
    pub fn update_config(&self, update: ConfigUpdate) -> Result<Vec<String>, AggregatorError> {
        let mut next = self.config.read().clone();
        let mut changes = Vec::new();

        if let Some(secs) = update.interval_secs {
            next.interval = Duration::from_secs(secs);
            changes.push("interval".to_string());
        }
        if let Some(max) = update.max_tokens_per_run {
            next.max_tokens_per_run = max;
            changes.push("max_tokens_per_run".to_string());
        }
        if let Some(max) = update.max_concurrent {
            next.max_concurrent = max;
            changes.push("max_concurrent".to_string());
        }
        if let Some(secs) = update.run_timeout_secs {
            next.run_timeout = Duration::from_secs(secs);
            changes.push("run_timeout".to_string());
        }
        let criteria_changed = match update.criteria {
            Some(criteria) => {
                let changed = criteria != next.criteria;
                next.criteria = criteria;
                changes.push("criteria".to_string());
                changed
            }
            None => false,
        };
        if let Some(alerts) = update.alerts {
            next.alerts = alerts;
            changes.push("alerts".to_string());
        }
        if let Some(policy) = update.blacklist_policy {
            next.blacklist_policy = policy;
            changes.push("blacklist_policy".to_string());
        }

        next.validate()?;
        *self.config.write() = next;

        if criteria_changed {
            // cached verdicts were computed against the old criteria
            self.pipeline.cache().clear();
        }

        info!("Configuration updated: {}", changes.join(", "));
        self.events.emit(AggregatorEvent::ConfigUpdated {
            changes: changes.clone(),
        });
        Ok(changes)
    }

    pub fn reset_stats(&self) {
        self.stats.lock().reset();
        self.pipeline.health().reset();
        info!("Statistics reset");
        self.events.emit(AggregatorEvent::StatsReset {
            reset_at: Utc::now(),
        });
    }

    /// Blacklist `address`. Returns false if it was already listed.
    pub fn add_to_blacklist(&self, address: &str, reason: &str) -> Result<bool, AggregatorError> {
        validate_address(address).map_err(AggregatorError::Address)?;
        Ok(self.blacklist_unchecked(address, reason))
    }

    fn blacklist_unchecked(&self, address: &str, reason: &str) -> bool {
        let added = self.blacklist.write().add(address, reason);
        if added {
            warn!("Blacklisted {}: {}", address, reason);
            self.pipeline.cache().remove(address);
            self.stats.lock().record_blacklisted();
            self.events.emit(AggregatorEvent::TokenBlacklisted {
                address: address.to_string(),
                reason: reason.to_string(),
            });
        }
        added
    }

    pub fn remove_from_blacklist(&self, address: &str) -> bool {
        let removed = self.blacklist.write().remove(address);
        if removed {
            info!("Removed {} from blacklist", address);
        }
        removed
    }

    pub fn blacklist_entry(&self, address: &str) -> Option<BlacklistEntry> {
        self.blacklist.read().get(address).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::provider::CacheStore;
    use crate::domain::{
        HolderData, MarketData, ProviderId, RoutingData, ScoringConfig, ScoringEngine,
        SecurityData, Stage,
    };
    use crate::ports::discovery::MockDiscoveryFeed;
    use crate::ports::mocks::MockStageProvider;
    use crate::ports::storage::MockAnalysisStore;
    use crate::ports::{DiscoveryError, ProviderSet, StoreError};

    fn addr(seed: u8) -> String {
        bs58::encode([seed; 32]).into_string()
    }

    fn pipeline(security: SecurityData) -> Arc<AnalysisPipeline> {
        let providers = ProviderSet::new(
            Arc::new(MockStageProvider::new(
                ProviderId::Market,
                Stage::present(MarketData {
                    liquidity_usd: 6_000.0,
                    volume_24h: 1_500.0,
                    ..Default::default()
                }),
            )),
            Arc::new(MockStageProvider::new(ProviderId::Security, Stage::present(security))),
            Arc::new(MockStageProvider::new(
                ProviderId::Routing,
                Stage::present(RoutingData {
                    route_found: true,
                    slippage_pct: 4.0,
                    ..Default::default()
                }),
            )),
            Arc::new(MockStageProvider::new(
                ProviderId::Holders,
                Stage::present(HolderData {
                    top_holders_percentage: 45.0,
                    ..Default::default()
                }),
            )),
        );
        Arc::new(AnalysisPipeline::new(
            providers,
            Arc::new(CacheStore::new("analysis", Duration::from_secs(300))),
            ScoringEngine::new(ScoringConfig::default()),
            EventBus::default(),
        ))
    }

    fn safe() -> SecurityData {
        SecurityData {
            safety_score: 8.0,
            ..Default::default()
        }
    }

    fn feed(addresses: Vec<String>) -> Arc<MockDiscoveryFeed> {
        let mut discovery = MockDiscoveryFeed::new();
        discovery
            .expect_candidate_addresses()
            .returning(move |limit| Ok(addresses.iter().take(limit).cloned().collect()));
        Arc::new(discovery)
    }

    fn accepting_store() -> Arc<MockAnalysisStore> {
        let mut store = MockAnalysisStore::new();
        store.expect_store_analysis().returning(|_| Ok(()));
        Arc::new(store)
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = AggregatorConfig {
            max_concurrent: 0,
            ..Default::default()
        };
        let result = Aggregator::new(
            config,
            pipeline(safe()),
            feed(vec![]),
            accepting_store(),
            EventBus::default(),
        );
        assert!(matches!(result, Err(AggregatorError::Config(_))));
    }

    #[tokio::test]
    async fn test_run_persists_passing_tokens() {
        let aggregator = Aggregator::new(
            AggregatorConfig::default(),
            pipeline(safe()),
            feed(vec![addr(1), addr(2), addr(1)]),
            accepting_store(),
            EventBus::default(),
        )
        .unwrap();

        let run = aggregator.run_once().await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.tokens_discovered, 3);
        assert_eq!(run.tokens_processed, 2);
        assert_eq!(run.tokens_passed, 2);
        assert_eq!(run.tokens_stored, 2);
        assert!(run.end_time.is_some());
        assert!(!aggregator.is_running());

        let stats = aggregator.stats();
        assert_eq!(stats.total_runs, 1);
        assert_eq!(stats.tokens_stored, 2);
        assert_eq!(aggregator.run_history(10).len(), 1);
    }

    #[tokio::test]
    async fn test_processed_tokens_skipped_next_run() {
        let aggregator = Aggregator::new(
            AggregatorConfig::default(),
            pipeline(safe()),
            feed(vec![addr(1), addr(2)]),
            accepting_store(),
            EventBus::default(),
        )
        .unwrap();

        aggregator.run_once().await.unwrap();
        let second = aggregator.run_once().await.unwrap();
        assert_eq!(second.tokens_discovered, 2);
        assert_eq!(second.tokens_processed, 0);
        assert_eq!(aggregator.run_history(10)[0].id, second.id);
    }

    #[tokio::test]
    async fn test_discovery_error_fails_run() {
        let mut discovery = MockDiscoveryFeed::new();
        discovery
            .expect_candidate_addresses()
            .returning(|_| Err(DiscoveryError::RateLimited));

        let aggregator = Aggregator::new(
            AggregatorConfig::default(),
            pipeline(safe()),
            Arc::new(discovery),
            accepting_store(),
            EventBus::default(),
        )
        .unwrap();

        let run = aggregator.run_once().await.unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.errors.len(), 1);
        assert_eq!(aggregator.stats().failed_runs, 1);
    }

    #[tokio::test]
    async fn test_persistence_failure_is_recorded() {
        let mut store = MockAnalysisStore::new();
        store
            .expect_store_analysis()
            .returning(|_| Err(StoreError::Unavailable("disk full".to_string())));

        let aggregator = Aggregator::new(
            AggregatorConfig::default(),
            pipeline(safe()),
            feed(vec![addr(1)]),
            Arc::new(store),
            EventBus::default(),
        )
        .unwrap();

        let run = aggregator.run_once().await.unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.tokens_passed, 1);
        assert_eq!(run.tokens_stored, 0);
        assert!(run.errors[0].contains("persistence failed"));
    }

    #[tokio::test]
    async fn test_honeypot_is_auto_blacklisted() {
        let honeypot = SecurityData {
            safety_score: 8.0,
            is_honeypot: true,
            ..Default::default()
        };
        let mut store = MockAnalysisStore::new();
        store.expect_store_analysis().never();

        let aggregator = Aggregator::new(
            AggregatorConfig::default(),
            pipeline(honeypot),
            feed(vec![addr(5)]),
            Arc::new(store),
            EventBus::default(),
        )
        .unwrap();
        let mut rx = aggregator.events().subscribe();

        let run = aggregator.run_once().await.unwrap();
        assert_eq!(run.tokens_passed, 0);
        let entry = aggregator.blacklist_entry(&addr(5)).unwrap();
        assert_eq!(entry.reason, "Confirmed honeypot");
        assert_eq!(aggregator.stats().tokens_blacklisted, 1);

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind());
        }
        assert!(kinds.contains(&"token:blacklisted"));
        assert_eq!(kinds.first(), Some(&"run:start"));
        assert_eq!(kinds.last(), Some(&"run:complete"));
    }

    #[tokio::test]
    async fn test_seeded_blacklist_skips_discovery() {
        let aggregator = Aggregator::new(
            AggregatorConfig::default(),
            pipeline(safe()),
            feed(vec![addr(1), addr(2)]),
            accepting_store(),
            EventBus::default(),
        )
        .unwrap();
        assert_eq!(aggregator.seed_blacklist([(addr(1), "scam")]), 1);

        let run = aggregator.run_once().await.unwrap();
        assert_eq!(run.tokens_processed, 1);

        assert!(aggregator.remove_from_blacklist(&addr(1)));
        assert!(!aggregator.remove_from_blacklist(&addr(1)));
    }

    #[tokio::test]
    async fn test_blacklist_rejects_malformed_addresses() {
        let aggregator = Aggregator::new(
            AggregatorConfig::default(),
            pipeline(safe()),
            feed(Vec::new()),
            accepting_store(),
            EventBus::default(),
        )
        .unwrap();

        assert!(matches!(
            aggregator.add_to_blacklist("not-a-mint-0OIl", "typo"),
            Err(AggregatorError::Address(_))
        ));
        assert!(aggregator.blacklist_entry("not-a-mint-0OIl").is_none());

        assert!(aggregator.add_to_blacklist(&addr(3), "manual").unwrap());
        assert!(!aggregator.add_to_blacklist(&addr(3), "manual").unwrap());
        assert_eq!(aggregator.stats().tokens_blacklisted, 1);

        let seeded = aggregator.seed_blacklist([(addr(4), "scam"), ("bad".to_string(), "typo")]);
        assert_eq!(seeded, 1);
        assert!(aggregator.blacklist_entry("bad").is_none());
    }

    #[tokio::test]
    async fn test_overlapping_run_is_rejected() {
        let aggregator = Aggregator::new(
            AggregatorConfig::default(),
            pipeline(safe()),
            feed(vec![]),
            accepting_store(),
            EventBus::default(),
        )
        .unwrap();

        aggregator.running.store(true, Ordering::SeqCst);
        assert!(matches!(
            aggregator.run_once().await,
            Err(AggregatorError::RunInProgress)
        ));
        assert!(aggregator.run_history(10).is_empty());
    }

    #[tokio::test]
    async fn test_update_config_validates_and_clears_cache() {
        let aggregator = Aggregator::new(
            AggregatorConfig::default(),
            pipeline(safe()),
            feed(vec![]),
            accepting_store(),
            EventBus::default(),
        )
        .unwrap();
        aggregator.analyze(&addr(7)).await.unwrap();
        assert_eq!(aggregator.pipeline().cache().len(), 1);

        let bad = ConfigUpdate {
            max_concurrent: Some(0),
            ..Default::default()
        };
        assert!(aggregator.update_config(bad).is_err());
        assert_eq!(aggregator.config().max_concurrent, 5);

        let update = ConfigUpdate {
            max_concurrent: Some(8),
            criteria: Some(FilterCriteria {
                min_liquidity: 50_000.0,
                ..Default::default()
            }),
            ..Default::default()
        };
        let changes = aggregator.update_config(update).unwrap();
        assert_eq!(changes, vec!["max_concurrent", "criteria"]);
        assert_eq!(aggregator.config().max_concurrent, 8);
        assert!(aggregator.pipeline().cache().is_empty());

        let analysis = aggregator.analyze(&addr(7)).await.unwrap();
        assert!(!analysis.passed);
    }

    #[tokio::test]
    async fn test_reset_stats_emits_event() {
        let aggregator = Aggregator::new(
            AggregatorConfig::default(),
            pipeline(safe()),
            feed(vec![addr(1)]),
            accepting_store(),
            EventBus::default(),
        )
        .unwrap();
        aggregator.run_once().await.unwrap();
        let mut rx = aggregator.events().subscribe();

        aggregator.reset_stats();
        assert_eq!(aggregator.stats().total_runs, 0);
        assert_eq!(rx.try_recv().unwrap().kind(), "stats:reset");
        assert!(aggregator.health_status().providers.iter().all(|p| p.calls == 0));

        let status = aggregator.system_status();
        assert!(!status.running);
        assert_eq!(status.processed_tokens, 1);
        assert!(status.last_run.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_stops_on_shutdown() {
        let aggregator = Arc::new(
            Aggregator::new(
                AggregatorConfig {
                    interval: Duration::from_secs(10),
                    ..Default::default()
                },
                pipeline(safe()),
                feed(vec![addr(1)]),
                accepting_store(),
                EventBus::default(),
            )
            .unwrap(),
        );
        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(Arc::clone(&aggregator).run_loop(rx));

        tokio::time::sleep(Duration::from_secs(25)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(aggregator.stats().total_runs >= 2);
    }
}
