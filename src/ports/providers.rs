//! Stage Provider Port
//!
//! One external data source that contributes a single stage to an analysis.
//! Implementations own their own retry and rate limiting and must never
//! fail: every outcome is folded into a `Stage`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{HolderData, MarketData, ProviderId, RoutingData, SecurityData, Stage};

#[async_trait]
pub trait StageProvider<T>: Send + Sync {
    /// Identity used for rate limiting, health tracking and events
    fn provider_id(&self) -> ProviderId;

    /// Fetch and normalize data for one token address
    async fn fetch(&self, address: &str) -> Stage<T>;
}

/// The four providers a pipeline fans out to
#[derive(Clone)]
pub struct ProviderSet {
    pub market: Arc<dyn StageProvider<MarketData>>,
    pub security: Arc<dyn StageProvider<SecurityData>>,
    pub routing: Arc<dyn StageProvider<RoutingData>>,
    pub holders: Arc<dyn StageProvider<HolderData>>,
}

impl ProviderSet {
    pub fn new(
        market: Arc<dyn StageProvider<MarketData>>,
        security: Arc<dyn StageProvider<SecurityData>>,
        routing: Arc<dyn StageProvider<RoutingData>>,
        holders: Arc<dyn StageProvider<HolderData>>,
    ) -> Self {
        Self {
            market,
            security,
            routing,
            holders,
        }
    }
}
