//! Aggregator Integration Tests
//!
//! End-to-end checks of the discovery -> analysis -> persistence flow:
//! 1. Filter evaluation on fully populated and adapter-flagged analyses
//! 2. Cache idempotence and partial-provider tolerance in the pipeline
//! 3. Batch isolation, per-run caps and the run deadline in the aggregator
//! 4. Rate limiter budgets
//!
//! All tests are deterministic (no real network calls) and use mock providers.

use std::sync::Arc;
use std::time::Duration;

use butters_scout::adapters::holders::{normalize_holders, HoldersResponse};
use butters_scout::adapters::provider::{
    CacheStore, ProviderError, RateLimitRule, RateLimiter,
};
use butters_scout::adapters::rugcheck::{normalize_report, ReportSummary};
use butters_scout::adapters::storage::MemoryAnalysisStore;
use butters_scout::application::{
    Aggregator, AggregatorConfig, AnalysisPipeline, EventBus,
};
use butters_scout::domain::{
    AbsentKind, FilterCriteria, HolderData, MarketData, ProviderId, RoutingData, RunStatus,
    ScoringConfig, ScoringEngine, SecurityData, Stage,
};
use butters_scout::ports::mocks::{MockDiscovery, MockStageProvider};
use butters_scout::ports::{AnalysisStore, ProviderSet};

// ============================================================================
// Test Fixtures
// ============================================================================

/// A valid base58 address derived from `seed`
fn addr(seed: u16) -> String {
    let mut bytes = [7u8; 32];
    bytes[..2].copy_from_slice(&seed.to_be_bytes());
    bs58::encode(bytes).into_string()
}

fn healthy_market() -> MarketData {
    MarketData {
        symbol: "SCOUT".to_string(),
        liquidity_usd: 6_000.0,
        volume_24h: 1_500.0,
        ..Default::default()
    }
}

fn healthy_security() -> SecurityData {
    SecurityData {
        safety_score: 7.0,
        ..Default::default()
    }
}

fn healthy_routing() -> RoutingData {
    RoutingData {
        route_found: true,
        slippage_pct: 4.0,
        ..Default::default()
    }
}

fn healthy_holders() -> HolderData {
    HolderData {
        creator_rugs: 1,
        top_holders_percentage: 45.0,
        ..Default::default()
    }
}

/// The four mock providers, kept so tests can script them and count calls
struct Providers {
    market: Arc<MockStageProvider<MarketData>>,
    security: Arc<MockStageProvider<SecurityData>>,
    routing: Arc<MockStageProvider<RoutingData>>,
    holders: Arc<MockStageProvider<HolderData>>,
}

impl Providers {
    fn healthy() -> Self {
        Self::with(
            MockStageProvider::new(ProviderId::Market, Stage::present(healthy_market())),
            MockStageProvider::new(ProviderId::Security, Stage::present(healthy_security())),
            MockStageProvider::new(ProviderId::Routing, Stage::present(healthy_routing())),
            MockStageProvider::new(ProviderId::Holders, Stage::present(healthy_holders())),
        )
    }

    fn with(
        market: MockStageProvider<MarketData>,
        security: MockStageProvider<SecurityData>,
        routing: MockStageProvider<RoutingData>,
        holders: MockStageProvider<HolderData>,
    ) -> Self {
        Self {
            market: Arc::new(market),
            security: Arc::new(security),
            routing: Arc::new(routing),
            holders: Arc::new(holders),
        }
    }

    fn total_calls(&self) -> usize {
        self.market.call_count()
            + self.security.call_count()
            + self.routing.call_count()
            + self.holders.call_count()
    }

    fn pipeline(&self, events: EventBus) -> Arc<AnalysisPipeline> {
        let set = ProviderSet::new(
            self.market.clone(),
            self.security.clone(),
            self.routing.clone(),
            self.holders.clone(),
        );
        Arc::new(AnalysisPipeline::new(
            set,
            Arc::new(CacheStore::new("analysis", Duration::from_secs(300))),
            ScoringEngine::new(ScoringConfig::default()),
            events,
        ))
    }
}

fn scenario_criteria() -> FilterCriteria {
    FilterCriteria {
        min_liquidity: 5_000.0,
        min_volume: 1_000.0,
        min_safety_score: 6.0,
        max_slippage: 10.0,
        max_creator_rugs: 2,
        max_top_holders_percentage: 60.0,
        ..Default::default()
    }
}

// ============================================================================
// Filter Scenarios
// ============================================================================

#[tokio::test]
async fn test_healthy_token_passes_all_filters() {
    let providers = Providers::healthy();
    let pipeline = providers.pipeline(EventBus::default());

    let analysis = pipeline.analyze(&addr(1), &scenario_criteria()).await.unwrap();

    assert!(analysis.passed);
    assert!(analysis.failed_filters.is_empty());
    assert!(analysis.overall_score <= 100);
    assert_eq!(analysis.present_stages(), 4);
}

#[tokio::test]
async fn test_low_liquidity_and_concentration_fail_in_order() {
    let target = addr(2);
    let providers = Providers::with(
        MockStageProvider::new(ProviderId::Market, Stage::present(healthy_market())).with_response(
            &target,
            Stage::present(MarketData {
                liquidity_usd: 3_000.0,
                ..healthy_market()
            }),
        ),
        MockStageProvider::new(ProviderId::Security, Stage::present(healthy_security())),
        MockStageProvider::new(ProviderId::Routing, Stage::present(healthy_routing())),
        MockStageProvider::new(ProviderId::Holders, Stage::present(healthy_holders()))
            .with_response(
                &target,
                Stage::present(HolderData {
                    top_holders_percentage: 70.0,
                    ..healthy_holders()
                }),
            ),
    );
    let pipeline = providers.pipeline(EventBus::default());

    let analysis = pipeline.analyze(&target, &scenario_criteria()).await.unwrap();

    assert!(!analysis.passed);
    assert_eq!(analysis.failed_filters.len(), 2);
    assert!(analysis.failed_filters[0].contains("Liquidity"));
    assert!(analysis.failed_filters[1].contains("Top holder"));
}

#[tokio::test]
async fn test_flagged_holder_data_fails_admission() {
    let target = addr(3);
    let response: HoldersResponse =
        serde_json::from_str(r#"{"holderCount": 10, "creator": {"rugCount": 0}}"#).unwrap();
    let providers = Providers::with(
        MockStageProvider::new(ProviderId::Market, Stage::present(healthy_market())),
        MockStageProvider::new(ProviderId::Security, Stage::present(healthy_security())),
        MockStageProvider::new(ProviderId::Routing, Stage::present(healthy_routing())),
        MockStageProvider::new(ProviderId::Holders, Stage::present(healthy_holders()))
            .with_response(&target, Stage::Present(normalize_holders(response))),
    );
    let pipeline = providers.pipeline(EventBus::default());

    let analysis = pipeline.analyze(&target, &scenario_criteria()).await.unwrap();

    assert!(analysis.holders.is_filtered());
    assert_eq!(analysis.present_stages(), 4);
    assert!(!analysis.passed);
    assert_eq!(analysis.failed_filters, vec!["Top holder data missing".to_string()]);
}

// ============================================================================
// Pipeline Properties
// ============================================================================

#[tokio::test]
async fn test_second_analysis_is_served_from_cache() {
    let providers = Providers::healthy();
    let pipeline = providers.pipeline(EventBus::default());
    let criteria = scenario_criteria();

    let first = pipeline.analyze(&addr(3), &criteria).await.unwrap();
    let calls = providers.total_calls();
    assert_eq!(calls, 4);

    let second = pipeline.analyze(&addr(3), &criteria).await.unwrap();
    assert_eq!(providers.total_calls(), calls);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_one_permanent_provider_failure_keeps_other_stages() {
    let providers = Providers::with(
        MockStageProvider::new(ProviderId::Market, Stage::present(healthy_market())),
        MockStageProvider::new(
            ProviderId::Security,
            Stage::absent(AbsentKind::Permanent, "HTTP 404"),
        ),
        MockStageProvider::new(ProviderId::Routing, Stage::present(healthy_routing())),
        MockStageProvider::new(ProviderId::Holders, Stage::present(healthy_holders())),
    );
    let pipeline = providers.pipeline(EventBus::default());

    let analysis = pipeline.analyze(&addr(4), &scenario_criteria()).await.unwrap();

    assert_eq!(analysis.present_stages(), 3);
    assert!(analysis.market.is_present());
    assert!(analysis.routing.is_present());
    assert!(analysis.holders.is_present());
    assert!(matches!(analysis.security, Stage::Absent(ref r) if r.kind == AbsentKind::Permanent));
    assert!(!analysis.passed);
}

#[tokio::test]
async fn test_batch_isolates_malformed_address() {
    let providers = Providers::healthy();
    let pipeline = providers.pipeline(EventBus::default());

    let mut addresses: Vec<String> = (10..19).map(addr).collect();
    addresses.insert(4, "not-a-mint-0OIl".to_string());
    assert_eq!(addresses.len(), 10);

    let completed = pipeline
        .process_batch(&addresses, &scenario_criteria(), 3)
        .await;

    assert_eq!(completed.len(), 9);
    assert!(completed.iter().all(|a| a.address != "not-a-mint-0OIl"));
    // The malformed address never reached a provider
    assert_eq!(providers.market.call_count(), 9);
}

// ============================================================================
// Aggregator Runs
// ============================================================================

#[tokio::test]
async fn test_run_caps_candidates_but_reports_full_feed() {
    let providers = Providers::healthy();
    let events = EventBus::default();
    let store = Arc::new(MemoryAnalysisStore::new());
    let feed: Vec<String> = (100..300).map(addr).collect();

    let config = AggregatorConfig {
        max_tokens_per_run: 50,
        discovery_limit: 200,
        criteria: scenario_criteria(),
        ..Default::default()
    };
    let aggregator = Aggregator::new(
        config,
        providers.pipeline(events.clone()),
        Arc::new(MockDiscovery::new(feed)),
        store.clone(),
        events,
    )
    .unwrap();

    let run = aggregator.run_once().await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.tokens_discovered, 200);
    assert!(run.tokens_processed <= 50);
    assert_eq!(run.tokens_processed, 50);
    assert_eq!(run.tokens_stored, 50);
    assert_eq!(store.len(), 50);
}

#[tokio::test(start_paused = true)]
async fn test_stuck_provider_fails_run_but_keeps_finished_results() {
    let stuck = addr(500);
    let providers = Providers::with(
        MockStageProvider::new(ProviderId::Market, Stage::present(healthy_market())),
        MockStageProvider::new(ProviderId::Security, Stage::present(healthy_security())),
        MockStageProvider::new(ProviderId::Routing, Stage::present(healthy_routing()))
            .hang_on(&stuck),
        MockStageProvider::new(ProviderId::Holders, Stage::present(healthy_holders())),
    );
    let events = EventBus::default();
    let store = Arc::new(MemoryAnalysisStore::new());
    let mut feed: Vec<String> = (501..505).map(addr).collect();
    feed.insert(0, stuck.clone());

    let config = AggregatorConfig {
        run_timeout: Duration::from_secs(30),
        criteria: scenario_criteria(),
        ..Default::default()
    };
    let aggregator = Aggregator::new(
        config,
        providers.pipeline(events.clone()),
        Arc::new(MockDiscovery::new(feed)),
        store.clone(),
        events,
    )
    .unwrap();

    let run = aggregator.run_once().await.unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.partial_timeout);
    assert!(run.end_time.is_some());
    assert!(!run.errors.is_empty());
    assert!(run.errors.iter().any(|e| e.contains(&stuck)));

    assert_eq!(run.tokens_stored, 4);
    assert!(store.latest_analysis(&stuck).await.unwrap().is_none());
    for address in (501..505).map(addr) {
        assert!(store.latest_analysis(&address).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_pipeline_and_aggregator_share_one_event_stream() {
    let providers = Providers::healthy();
    let events = EventBus::default();
    let mut receiver = events.subscribe();

    let aggregator = Aggregator::new(
        AggregatorConfig {
            criteria: scenario_criteria(),
            ..Default::default()
        },
        providers.pipeline(events.clone()),
        Arc::new(MockDiscovery::new(vec![addr(600)])),
        Arc::new(MemoryAnalysisStore::new()),
        events,
    )
    .unwrap();

    aggregator.run_once().await.unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        kinds.push(event.kind());
    }
    assert_eq!(kinds.first(), Some(&"run:start"));
    assert_eq!(kinds.last(), Some(&"run:complete"));
    assert!(kinds.contains(&"stage:complete"));
    assert!(kinds.contains(&"token:stored"));

    let stage_starts = kinds.iter().filter(|k| **k == "stage:start").count();
    assert_eq!(stage_starts, 4);
}

#[tokio::test]
async fn test_failed_discovery_still_finalizes_run() {
    let events = EventBus::default();
    let aggregator = Aggregator::new(
        AggregatorConfig::default(),
        Providers::healthy().pipeline(events.clone()),
        Arc::new(MockDiscovery::failing()),
        Arc::new(MemoryAnalysisStore::new()),
        events,
    )
    .unwrap();

    let run = aggregator.run_once().await.unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.end_time.is_some());
    assert_eq!(aggregator.stats().failed_runs, 1);
    assert!(!aggregator.is_running());
}

#[tokio::test]
async fn test_run_never_stores_token_with_flagged_security() {
    let flagged = addr(600);
    let report: ReportSummary =
        serde_json::from_str(r#"{"risks": [{"name": "Mutable metadata", "level": "warn"}]}"#)
            .unwrap();
    let providers = Providers::with(
        MockStageProvider::new(ProviderId::Market, Stage::present(healthy_market())),
        MockStageProvider::new(ProviderId::Security, Stage::present(healthy_security()))
            .with_response(&flagged, Stage::Present(normalize_report(report))),
        MockStageProvider::new(ProviderId::Routing, Stage::present(healthy_routing())),
        MockStageProvider::new(ProviderId::Holders, Stage::present(healthy_holders())),
    );
    let events = EventBus::default();
    let store = Arc::new(MemoryAnalysisStore::new());
    let feed = vec![flagged.clone(), addr(601), addr(602)];

    let config = AggregatorConfig {
        criteria: scenario_criteria(),
        ..Default::default()
    };
    let aggregator = Aggregator::new(
        config,
        providers.pipeline(events.clone()),
        Arc::new(MockDiscovery::new(feed)),
        store.clone(),
        events,
    )
    .unwrap();

    let run = aggregator.run_once().await.unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.tokens_processed, 3);
    assert_eq!(run.tokens_passed, 2);
    assert_eq!(run.tokens_stored, 2);
    assert!(store.latest_analysis(&flagged).await.unwrap().is_none());
    assert_eq!(
        aggregator.stats().failure_reasons.get("Safety score missing"),
        Some(&1)
    );

    // the cached verdict carries the adapter's reason
    let analysis = aggregator.analyze(&flagged).await.unwrap();
    assert!(!analysis.passed);
    assert_eq!(analysis.failed_filters, vec!["Safety score missing".to_string()]);
}

// ============================================================================
// Rate Limiter
// ============================================================================

#[tokio::test]
async fn test_limiter_rejects_call_over_budget() {
    let limiter = RateLimiter::new().with_rule(
        ProviderId::Security,
        RateLimitRule::new(3, Duration::from_secs(60), Duration::ZERO),
    );

    for _ in 0..3 {
        limiter.acquire(ProviderId::Security).await.unwrap();
    }
    let over = limiter.acquire(ProviderId::Security).await;
    assert!(matches!(over, Err(ProviderError::RateLimited(_))));
}

#[tokio::test(start_paused = true)]
async fn test_limiter_delays_call_over_budget_until_window_slides() {
    let limiter = RateLimiter::new().with_rule(
        ProviderId::Market,
        RateLimitRule::new(3, Duration::from_secs(60), Duration::from_secs(120)),
    );
    let start = tokio::time::Instant::now();

    for _ in 0..3 {
        limiter.acquire(ProviderId::Market).await.unwrap();
    }
    assert!(start.elapsed() < Duration::from_secs(1));

    limiter.acquire(ProviderId::Market).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(60));
}
