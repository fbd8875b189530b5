//! Provider Health Tracking
//!
//! Per-provider call counts, failures and recent latency, recorded by the
//! pipeline after every stage and combined with limiter state on request.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::adapters::provider::{RateLimitState, RateLimiter};
use crate::domain::ProviderId;

/// Latency samples kept per provider
const LATENCY_WINDOW: usize = 100;

/// Error rate above which a provider is reported degraded
pub const DEGRADED_ERROR_RATE: f64 = 0.25;

/// Error rate above which a provider is reported down
pub const DOWN_ERROR_RATE: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderStatus {
    Healthy,
    Degraded,
    Down,
    /// No calls recorded yet
    Unknown,
}

#[derive(Debug, Default)]
struct Counters {
    calls: u64,
    failures: u64,
    latencies_ms: VecDeque<u64>,
    last_error: Option<String>,
    last_error_at: Option<DateTime<Utc>>,
}

/// Snapshot of one provider's health
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub provider: ProviderId,
    pub status: ProviderStatus,
    pub calls: u64,
    pub failures: u64,
    pub error_rate: f64,
    pub avg_latency_ms: f64,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

/// Health of every stage provider plus limiter windows
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub healthy: bool,
    pub providers: Vec<ProviderHealth>,
    pub rate_limits: Vec<RateLimitState>,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct HealthTracker {
    counters: DashMap<ProviderId, Counters>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, provider: ProviderId, latency_ms: u64) {
        let mut counters = self.counters.entry(provider).or_default();
        counters.calls += 1;
        push_latency(&mut counters, latency_ms);
    }

    pub fn record_failure(&self, provider: ProviderId, latency_ms: u64, error: impl Into<String>) {
        let mut counters = self.counters.entry(provider).or_default();
        counters.calls += 1;
        counters.failures += 1;
        counters.last_error = Some(error.into());
        counters.last_error_at = Some(Utc::now());
        push_latency(&mut counters, latency_ms);
    }

    /// Snapshot for one provider; zeroed when it has never been called
    pub fn provider(&self, provider: ProviderId) -> ProviderHealth {
        match self.counters.get(&provider) {
            Some(counters) => snapshot(provider, &counters),
            None => snapshot(provider, &Counters::default()),
        }
    }

    /// Snapshot of the four stage providers, with limiter windows when available
    pub fn status(&self, limiter: Option<&RateLimiter>) -> HealthStatus {
        let providers: Vec<ProviderHealth> = ProviderId::STAGES
            .iter()
            .map(|id| self.provider(*id))
            .collect();
        let healthy = providers.iter().all(|p| p.status != ProviderStatus::Down);

        HealthStatus {
            healthy,
            providers,
            rate_limits: limiter.map(RateLimiter::states).unwrap_or_default(),
            checked_at: Utc::now(),
        }
    }

    pub fn reset(&self) {
        self.counters.clear();
    }
}

fn push_latency(counters: &mut Counters, latency_ms: u64) {
    if counters.latencies_ms.len() == LATENCY_WINDOW {
        counters.latencies_ms.pop_front();
    }
    counters.latencies_ms.push_back(latency_ms);
}

fn snapshot(provider: ProviderId, counters: &Counters) -> ProviderHealth {
    let error_rate = if counters.calls == 0 {
        0.0
    } else {
        counters.failures as f64 / counters.calls as f64
    };
    let avg_latency_ms = if counters.latencies_ms.is_empty() {
        0.0
    } else {
        counters.latencies_ms.iter().sum::<u64>() as f64 / counters.latencies_ms.len() as f64
    };
    let status = if counters.calls == 0 {
        ProviderStatus::Unknown
    } else if error_rate > DOWN_ERROR_RATE {
        ProviderStatus::Down
    } else if error_rate > DEGRADED_ERROR_RATE {
        ProviderStatus::Degraded
    } else {
        ProviderStatus::Healthy
    };

    ProviderHealth {
        provider,
        status,
        calls: counters.calls,
        failures: counters.failures,
        error_rate,
        avg_latency_ms,
        last_error: counters.last_error.clone(),
        last_error_at: counters.last_error_at,
    }
}
