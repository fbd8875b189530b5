//! Shared Provider HTTP Client
//!
//! One GET per fetch, wrapped in: raw-response cache check, rate limiter
//! acquire (every attempt), then retry with exponential backoff and jitter.
//!
//! Retry rules:
//! - network errors, timeouts and 5xx are retried
//! - 429 is retried after `retry-after` (seconds) when present
//! - any other 4xx fails immediately, unless the adapter declared the
//!   status as handled (e.g. routing's "no route" 400)

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::cache::CacheStore;
use super::error::ProviderError;
use super::rate_limiter::RateLimiter;
use crate::domain::ProviderId;

/// Longest error body kept in a `Permanent` message
const MAX_ERROR_BODY: usize = 200;

/// Retry and timeout settings for one provider
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            timeout: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// `base * 2^attempt` capped at `max_delay`, plus up to half a base of jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay);
        let jitter_ms = (self.base_delay.as_millis() / 2) as u64;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        exp + Duration::from_millis(jitter)
    }
}

/// Status, retry hint and body of one HTTP exchange
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ProviderError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// What the retry loop should do with a response
#[derive(Debug, PartialEq)]
pub enum Disposition {
    Accept,
    Retry {
        error: ProviderError,
        wait: Option<Duration>,
    },
    Fail(ProviderError),
}

/// Pure classification of a response status
pub fn classify(response: &RawResponse, handled: &[u16]) -> Disposition {
    let status = response.status;

    if response.is_success() || handled.contains(&status) {
        return Disposition::Accept;
    }

    if status == 429 {
        return Disposition::Retry {
            error: ProviderError::RateLimited("provider returned 429".to_string()),
            wait: response.retry_after,
        };
    }

    if (500..600).contains(&status) {
        return Disposition::Retry {
            error: ProviderError::Transient(format!("server error {}", status)),
            wait: None,
        };
    }

    let message: String = response.body.chars().take(MAX_ERROR_BODY).collect();
    Disposition::Fail(ProviderError::Permanent { status, message })
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// HTTP plumbing shared by every provider adapter
#[derive(Debug, Clone)]
pub struct ProviderHttp {
    provider: ProviderId,
    http: Client,
    limiter: Arc<RateLimiter>,
    raw_cache: Option<(Arc<CacheStore<RawResponse>>, Duration)>,
    policy: RetryPolicy,
    headers: Vec<(String, String)>,
    handled_statuses: Vec<u16>,
}

impl ProviderHttp {
    pub fn new(
        provider: ProviderId,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
    ) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(policy.timeout)
            .build()
            .map_err(|e| ProviderError::Transient(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            provider,
            http,
            limiter,
            raw_cache: None,
            policy,
            headers: Vec::new(),
            handled_statuses: Vec::new(),
        })
    }

    /// Builder method to memoize raw responses by `"<provider>:<address>"` for `ttl`
    pub fn with_raw_cache(mut self, cache: Arc<CacheStore<RawResponse>>, ttl: Duration) -> Self {
        self.raw_cache = Some((cache, ttl));
        self
    }

    /// Builder method to add a header to every request
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Builder method to accept a non-2xx status as a normal response
    pub fn with_handled_status(mut self, status: u16) -> Self {
        self.handled_statuses.push(status);
        self
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    fn cache_key(&self, address: &str) -> String {
        format!("{}:{}", self.provider, address)
    }

    /// GET `url` for `address`, going through the raw cache
    pub async fn get(
        &self,
        address: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<RawResponse, ProviderError> {
        let key = self.cache_key(address);
        if let Some((cache, _)) = &self.raw_cache {
            if let Some(hit) = cache.get(&key) {
                debug!("{} raw cache hit for {}", self.provider, address);
                return Ok(hit);
            }
        }

        let response = self.get_uncached(url, query).await?;

        if let Some((cache, ttl)) = &self.raw_cache {
            cache.set(key, response.clone(), *ttl);
        }
        Ok(response)
    }

    /// GET `url` without touching the raw cache
    pub async fn get_uncached(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<RawResponse, ProviderError> {
        self.execute_with_retry(|| self.send_once(url, query)).await
    }

    async fn send_once(&self, url: &str, query: &[(&str, String)]) -> Result<RawResponse, ProviderError> {
        let mut req = self.http.get(url).query(query);
        for (name, value) in &self.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await?;

        Ok(RawResponse {
            status,
            retry_after,
            body,
        })
    }

    /// Execute request with retry logic and rate limit handling
    pub async fn execute_with_retry<F, Fut>(&self, mut request_fn: F) -> Result<RawResponse, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<RawResponse, ProviderError>>,
    {
        let attempts = self.policy.max_retries.max(1);
        let mut last_error = None;

        for attempt in 0..attempts {
            // Limiter failures are final: waiting longer is what max_wait forbids
            self.limiter.acquire(self.provider).await?;

            let wait = match request_fn().await {
                Ok(response) => match classify(&response, &self.handled_statuses) {
                    Disposition::Accept => return Ok(response),
                    Disposition::Fail(error) => return Err(error),
                    Disposition::Retry { error, wait } => {
                        last_error = Some(error);
                        wait
                    }
                },
                Err(error) if error.is_retryable() => {
                    last_error = Some(error);
                    None
                }
                Err(error) => return Err(error),
            };

            if attempt + 1 < attempts {
                let backoff = wait
                    .map(|w| w.min(self.policy.max_delay))
                    .unwrap_or_else(|| self.policy.backoff(attempt));
                warn!(
                    "{} request failed ({}), retrying in {:?} (attempt {}/{})",
                    self.provider,
                    last_error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                    backoff,
                    attempt + 1,
                    attempts
                );
                tokio::time::sleep(backoff).await;
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Transient("Max retries exceeded".into())))
    }
}
