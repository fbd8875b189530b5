use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::domain::CombinedAnalysis;
use crate::ports::{AnalysisStore, StoreError};

/// In-process store, used for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryAnalysisStore {
    entries: RwLock<HashMap<String, Vec<CombinedAnalysis>>>,
    fail_writes: AtomicBool,
}

impl MemoryAnalysisStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with `StoreError::Unavailable`
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Total analyses stored across all addresses
    pub fn len(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Addresses with at least one stored analysis
    pub fn addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.entries.read().keys().cloned().collect();
        addresses.sort();
        addresses
    }
}

#[async_trait]
impl AnalysisStore for MemoryAnalysisStore {
    async fn store_analysis(&self, analysis: &CombinedAnalysis) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        self.entries
            .write()
            .entry(analysis.address.clone())
            .or_default()
            .push(analysis.clone());
        Ok(())
    }

    async fn latest_analysis(&self, address: &str) -> Result<Option<CombinedAnalysis>, StoreError> {
        Ok(self
            .entries
            .read()
            .get(address)
            .and_then(|entries| entries.last().cloned()))
    }

    async fn history(&self, address: &str, limit: usize) -> Result<Vec<CombinedAnalysis>, StoreError> {
        Ok(self
            .entries
            .read()
            .get(address)
            .map(|entries| entries.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
