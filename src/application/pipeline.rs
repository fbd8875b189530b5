//! Analysis Pipeline
//!
//! One address in, one `CombinedAnalysis` out:
//! validate -> cache check -> four concurrent provider stages -> score ->
//! ordered filter evaluation -> cache -> `token:complete`.
//!
//! Batches run with bounded concurrency. A token that fails validation or
//! panics is logged and skipped; the rest of the batch carries on.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::events::{AggregatorEvent, EventBus};
use super::health::HealthTracker;
use crate::adapters::provider::CacheStore;
use crate::domain::{
    validate_address, CombinedAnalysis, FilterCriteria, ScoringEngine, Stage, ValidationError,
};
use crate::ports::{ProviderSet, StageProvider};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),
}

/// A token dropped from a batch and why
#[derive(Debug, Clone, PartialEq)]
pub struct FailedAnalysis {
    pub address: String,
    pub error: String,
}

/// Result of a deadline-bounded batch
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub completed: Vec<CombinedAnalysis>,
    pub failed: Vec<FailedAnalysis>,
    /// Addresses still in flight (or never started) when the deadline hit
    pub unfinished: Vec<String>,
}

impl BatchOutcome {
    pub fn timed_out(&self) -> bool {
        !self.unfinished.is_empty()
    }
}

pub struct AnalysisPipeline {
    providers: ProviderSet,
    cache: Arc<CacheStore<CombinedAnalysis>>,
    scoring: ScoringEngine,
    events: EventBus,
    health: Arc<HealthTracker>,
}

impl AnalysisPipeline {
    pub fn new(
        providers: ProviderSet,
        cache: Arc<CacheStore<CombinedAnalysis>>,
        scoring: ScoringEngine,
        events: EventBus,
    ) -> Self {
        Self {
            providers,
            cache,
            scoring,
            events,
            health: Arc::new(HealthTracker::new()),
        }
    }

    /// Share a health tracker owned elsewhere instead of the private default
    pub fn with_health(mut self, health: Arc<HealthTracker>) -> Self {
        self.health = health;
        self
    }

    pub fn cache(&self) -> &Arc<CacheStore<CombinedAnalysis>> {
        &self.cache
    }

    pub fn health(&self) -> &Arc<HealthTracker> {
        &self.health
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    /// Analyze one token. Provider trouble degrades the result; only bad
    /// input is an error.
    pub async fn analyze(
        &self,
        address: &str,
        criteria: &FilterCriteria,
    ) -> Result<CombinedAnalysis, PipelineError> {
        validate_address(address)?;
        criteria.validate()?;

        if let Some(cached) = self.cache.get(address) {
            debug!("Analysis cache hit for {}", address);
            self.events.emit(AggregatorEvent::TokenComplete {
                address: address.to_string(),
                score: cached.overall_score,
                passed: cached.passed,
                cached: true,
            });
            return Ok(cached);
        }

        let (market, security, routing, holders) = tokio::join!(
            self.run_stage(address, self.providers.market.as_ref()),
            self.run_stage(address, self.providers.security.as_ref()),
            self.run_stage(address, self.providers.routing.as_ref()),
            self.run_stage(address, self.providers.holders.as_ref()),
        );

        let now = Utc::now();
        let mut analysis = CombinedAnalysis {
            address: address.to_string(),
            market,
            security,
            routing,
            holders,
            overall_score: 0,
            passed: false,
            failed_filters: Vec::new(),
            recommendations: Vec::new(),
            timestamp: now,
        };

        let card = self.scoring.score(&analysis);
        analysis.overall_score = card.breakdown.total;
        analysis.recommendations = card.recommendations;
        analysis.failed_filters = criteria.evaluate(&analysis, now);
        analysis.passed = analysis.failed_filters.is_empty();

        self.cache.insert(address, analysis.clone());

        debug!(
            "{} ({}) scored {} with {}/4 stages, {}",
            analysis.display_name(),
            address,
            analysis.overall_score,
            analysis.present_stages(),
            if analysis.passed { "PASSED" } else { "failed" }
        );
        self.events.emit(AggregatorEvent::TokenComplete {
            address: address.to_string(),
            score: analysis.overall_score,
            passed: analysis.passed,
            cached: false,
        });

        Ok(analysis)
    }

    async fn run_stage<T: Send>(&self, address: &str, provider: &dyn StageProvider<T>) -> Stage<T> {
        let provider_id = provider.provider_id();
        self.events.emit(AggregatorEvent::StageStart {
            address: address.to_string(),
            provider: provider_id,
        });

        let started = Instant::now();
        let stage = provider.fetch(address).await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match &stage {
            Stage::Present(_) => self.health.record_success(provider_id, latency_ms),
            Stage::Absent(reason) => {
                debug!("{} stage absent for {}: {}", provider_id, address, reason.message);
                self.health
                    .record_failure(provider_id, latency_ms, reason.message.clone());
            }
        }

        self.events.emit(AggregatorEvent::StageComplete {
            address: address.to_string(),
            provider: provider_id,
            success: stage.is_present(),
            filtered: stage.is_filtered(),
            latency_ms,
        });
        stage
    }

    /// Analyze every address with at most `max_concurrent` in flight.
    /// Failed tokens are logged and left out.
    pub async fn process_batch(
        &self,
        addresses: &[String],
        criteria: &FilterCriteria,
        max_concurrent: usize,
    ) -> Vec<CombinedAnalysis> {
        self.run_batch(addresses, criteria, max_concurrent, None)
            .await
            .completed
    }

    /// Like `process_batch`, but stops at `deadline` and reports what was
    /// left unfinished. Outstanding analyses are dropped.
    pub async fn process_batch_until(
        &self,
        addresses: &[String],
        criteria: &FilterCriteria,
        max_concurrent: usize,
        deadline: Instant,
    ) -> BatchOutcome {
        self.run_batch(addresses, criteria, max_concurrent, Some(deadline))
            .await
    }

    async fn run_batch(
        &self,
        addresses: &[String],
        criteria: &FilterCriteria,
        max_concurrent: usize,
        deadline: Option<Instant>,
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        if addresses.is_empty() {
            return outcome;
        }

        let mut finished: HashSet<String> = HashSet::with_capacity(addresses.len());
        let mut results = stream::iter(addresses.iter().cloned().map(move |address| async move {
            let result = AssertUnwindSafe(self.analyze(&address, criteria))
                .catch_unwind()
                .await;
            (address, result)
        }))
        .buffer_unordered(max_concurrent.max(1));

        let expiry = async {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expiry);

        loop {
            tokio::select! {
                biased;
                next = results.next() => {
                    let Some((address, result)) = next else { break };
                    match result {
                        Ok(Ok(analysis)) => outcome.completed.push(analysis),
                        Ok(Err(e)) => {
                            warn!("Skipping {}: {}", address, e);
                            outcome.failed.push(FailedAnalysis {
                                address: address.clone(),
                                error: e.to_string(),
                            });
                        }
                        Err(panic) => {
                            let message = panic_message(panic.as_ref());
                            error!("Analysis of {} panicked: {}", address, message);
                            outcome.failed.push(FailedAnalysis {
                                address: address.clone(),
                                error: format!("analysis panicked: {}", message),
                            });
                        }
                    }
                    finished.insert(address);
                }
                _ = &mut expiry => {
                    warn!(
                        "Batch deadline reached with {}/{} tokens finished",
                        finished.len(),
                        addresses.len()
                    );
                    break;
                }
            }
        }
        drop(results);

        outcome.unfinished = addresses
            .iter()
            .filter(|address| !finished.contains(*address))
            .cloned()
            .collect();

        info!(
            "Batch done: {} analyzed, {} failed, {} unfinished",
            outcome.completed.len(),
            outcome.failed.len(),
            outcome.unfinished.len()
        );
        outcome
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
