use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Discovery feed request failed: {0}")]
    Request(String),
    #[error("Discovery feed returned malformed data: {0}")]
    Malformed(String),
    #[error("Discovery feed rate limited")]
    RateLimited,
}

/// Source of newly listed token addresses
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DiscoveryFeed: Send + Sync {
    /// Up to `limit` candidate mint addresses, newest first
    async fn candidate_addresses(&self, limit: usize) -> Result<Vec<String>, DiscoveryError>;
}
