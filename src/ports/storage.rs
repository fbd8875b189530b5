//! Analysis Store Port
//!
//! Persistence for passing analyses. The aggregator only writes; readers
//! (CLI, API layers) use `latest_analysis` and `history`.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::CombinedAnalysis;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    async fn store_analysis(&self, analysis: &CombinedAnalysis) -> Result<(), StoreError>;

    /// Most recently stored analysis for `address`
    async fn latest_analysis(&self, address: &str) -> Result<Option<CombinedAnalysis>, StoreError>;

    /// Up to `limit` stored analyses for `address`, newest first
    async fn history(&self, address: &str, limit: usize) -> Result<Vec<CombinedAnalysis>, StoreError>;
}
