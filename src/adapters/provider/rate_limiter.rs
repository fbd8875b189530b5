//! Provider Rate Limiter
//!
//! Per-provider sliding window. A caller reserves the earliest slot that
//! keeps at most `max_requests` grants inside any `window`, then sleeps
//! until that slot outside the lock. Reservations are counted as soon as
//! they are made, so concurrent callers never share a slot and a request
//! that later times out still spends its budget.
//!
//! Window math runs on `tokio::time::Instant` (monotonic, pausable in tests).

use std::collections::VecDeque;
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::error::ProviderError;
use crate::domain::ProviderId;

/// Budget for one provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window: Duration,
    /// Longest a caller may be queued before failing with `RateLimited`
    pub max_wait: Duration,
}

impl RateLimitRule {
    pub fn new(max_requests: u32, window: Duration, max_wait: Duration) -> Self {
        Self {
            max_requests: max_requests.max(1),
            window,
            max_wait,
        }
    }
}

/// Snapshot of one provider's window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitState {
    pub provider: ProviderId,
    /// Grants inside the current window, including reservations not yet due
    pub request_count: usize,
    pub max_requests: u32,
    pub window_ms: u64,
    /// Age of the oldest grant still counted in the window
    pub window_start_ms_ago: Option<u64>,
}

#[derive(Debug)]
struct Window {
    rule: RateLimitRule,
    /// Grant instants, non-decreasing; may lie in the future
    grants: VecDeque<Instant>,
}

impl Window {
    fn new(rule: RateLimitRule) -> Self {
        Self {
            rule,
            grants: VecDeque::with_capacity(rule.max_requests as usize),
        }
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.grants.front() {
            if *front + self.rule.window <= now {
                self.grants.pop_front();
            } else {
                break;
            }
        }
    }

    /// Reserve the next slot, or refuse if it is further away than `max_wait`
    fn reserve(&mut self, now: Instant) -> Result<Instant, Duration> {
        self.prune(now);

        let max = self.rule.max_requests as usize;
        let slot = if self.grants.len() >= max {
            let anchor = self.grants[self.grants.len() - max];
            (anchor + self.rule.window).max(now)
        } else {
            now
        };

        let wait = slot.saturating_duration_since(now);
        if wait > self.rule.max_wait {
            return Err(wait);
        }

        self.grants.push_back(slot);
        Ok(slot)
    }
}

/// Sliding-window limiter keyed by provider. Providers without a rule are unlimited.
#[derive(Debug, Default)]
pub struct RateLimiter {
    windows: DashMap<ProviderId, Window>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to register a provider budget
    pub fn with_rule(self, provider: ProviderId, rule: RateLimitRule) -> Self {
        self.set_rule(provider, rule);
        self
    }

    /// Replace a provider budget; outstanding grants are kept
    pub fn set_rule(&self, provider: ProviderId, rule: RateLimitRule) {
        self.windows
            .entry(provider)
            .and_modify(|w| w.rule = rule)
            .or_insert_with(|| Window::new(rule));
    }

    /// Wait for a slot for `provider`
    pub async fn acquire(&self, provider: ProviderId) -> Result<(), ProviderError> {
        let now = Instant::now();
        let slot = {
            let Some(mut window) = self.windows.get_mut(&provider) else {
                return Ok(());
            };
            window.reserve(now)
        };

        match slot {
            Ok(at) if at > now => {
                debug!(
                    "{} rate limit: waiting {:?} for a slot",
                    provider,
                    at.saturating_duration_since(now)
                );
                tokio::time::sleep_until(at).await;
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(wait) => {
                warn!("{} rate limit: next slot in {:?}, giving up", provider, wait);
                Err(ProviderError::RateLimited(format!(
                    "{} budget exhausted, next slot in {}ms",
                    provider,
                    wait.as_millis()
                )))
            }
        }
    }

    pub fn state(&self, provider: ProviderId) -> Option<RateLimitState> {
        let now = Instant::now();
        let mut window = self.windows.get_mut(&provider)?;
        window.prune(now);
        Some(RateLimitState {
            provider,
            request_count: window.grants.len(),
            max_requests: window.rule.max_requests,
            window_ms: window.rule.window.as_millis() as u64,
            window_start_ms_ago: window
                .grants
                .front()
                .map(|first| now.saturating_duration_since(*first).as_millis() as u64),
        })
    }

    /// States for every configured provider, ordered by provider
    pub fn states(&self) -> Vec<RateLimitState> {
        let mut providers: Vec<ProviderId> = self.windows.iter().map(|e| *e.key()).collect();
        providers.sort();
        providers
            .into_iter()
            .filter_map(|p| self.state(p))
            .collect()
    }
}
