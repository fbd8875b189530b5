//! Scriptable port implementations for integration tests and dry runs

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::discovery::{DiscoveryError, DiscoveryFeed};
use super::providers::StageProvider;
use crate::domain::{ProviderId, Stage};

/// Stage provider that records calls and returns scripted stages
pub struct MockStageProvider<T> {
    id: ProviderId,
    default: Stage<T>,
    responses: Mutex<HashMap<String, Stage<T>>>,
    hang: Mutex<HashSet<String>>,
    panic_on: Mutex<HashSet<String>>,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl<T: Clone + Send + Sync> MockStageProvider<T> {
    /// Returns `default` for every address without a scripted response
    pub fn new(id: ProviderId, default: Stage<T>) -> Self {
        Self {
            id,
            default,
            responses: Mutex::new(HashMap::new()),
            hang: Mutex::new(HashSet::new()),
            panic_on: Mutex::new(HashSet::new()),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Builder method to script the stage for one address
    pub fn with_response(self, address: &str, stage: Stage<T>) -> Self {
        self.responses.lock().insert(address.to_string(), stage);
        self
    }

    /// Never resolve for `address`
    pub fn hang_on(self, address: &str) -> Self {
        self.hang.lock().insert(address.to_string());
        self
    }

    /// Panic inside `fetch` for `address`
    pub fn panic_on(self, address: &str) -> Self {
        self.panic_on.lock().insert(address.to_string());
        self
    }

    /// Sleep before answering every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Get all recorded calls
    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync + 'static> StageProvider<T> for MockStageProvider<T> {
    fn provider_id(&self) -> ProviderId {
        self.id
    }

    async fn fetch(&self, address: &str) -> Stage<T> {
        self.calls.lock().push(address.to_string());

        if self.panic_on.lock().contains(address) {
            panic!("scripted provider panic for {}", address);
        }
        if self.hang.lock().contains(address) {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.responses
            .lock()
            .get(address)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }
}

/// Discovery feed serving a fixed address list
#[derive(Debug, Default)]
pub struct MockDiscovery {
    addresses: Vec<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockDiscovery {
    pub fn new(addresses: Vec<String>) -> Self {
        Self {
            addresses,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Feed that errors on every call
    pub fn failing() -> Self {
        Self {
            addresses: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiscoveryFeed for MockDiscovery {
    async fn candidate_addresses(&self, limit: usize) -> Result<Vec<String>, DiscoveryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DiscoveryError::Request("scripted failure".to_string()));
        }
        Ok(self.addresses.iter().take(limit).cloned().collect())
    }
}
