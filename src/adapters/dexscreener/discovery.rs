//! DexScreener Discovery Feed
//!
//! Newest token profiles (optionally boosted tokens too), Solana only,
//! deduplicated in feed order.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::types::TokenProfile;
use crate::adapters::provider::{ProviderError, ProviderHttp};
use crate::ports::{DiscoveryError, DiscoveryFeed};

const SOLANA_CHAIN: &str = "solana";

#[derive(Debug, Clone)]
pub struct DexScreenerDiscovery {
    api_base_url: String,
    http: ProviderHttp,
    include_boosts: bool,
}

impl DexScreenerDiscovery {
    pub fn new(api_base_url: impl Into<String>, http: ProviderHttp) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            http,
            include_boosts: false,
        }
    }

    /// Also pull `token-boosts/latest/v1`
    pub fn with_boosts(mut self, include: bool) -> Self {
        self.include_boosts = include;
        self
    }

    async fn fetch_list(&self, path: &str) -> Result<Vec<TokenProfile>, ProviderError> {
        let url = format!("{}/{}", self.api_base_url, path);
        self.http.get_uncached(&url, &[]).await?.json()
    }
}

/// Solana addresses in feed order, first occurrence wins, at most `limit`
pub fn collect_addresses(profiles: &[TokenProfile], limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    profiles
        .iter()
        .filter(|p| p.chain_id == SOLANA_CHAIN && !p.token_address.is_empty())
        .filter(|p| seen.insert(p.token_address.clone()))
        .map(|p| p.token_address.clone())
        .take(limit)
        .collect()
}

impl From<ProviderError> for DiscoveryError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::RateLimited(_) => DiscoveryError::RateLimited,
            ProviderError::Decode(msg) => DiscoveryError::Malformed(msg),
            other => DiscoveryError::Request(other.to_string()),
        }
    }
}

#[async_trait]
impl DiscoveryFeed for DexScreenerDiscovery {
    async fn candidate_addresses(&self, limit: usize) -> Result<Vec<String>, DiscoveryError> {
        let mut profiles = self.fetch_list("token-profiles/latest/v1").await?;

        if self.include_boosts {
            // Boosts are a bonus; the profile feed alone is a valid answer
            match self.fetch_list("token-boosts/latest/v1").await {
                Ok(boosts) => profiles.extend(boosts),
                Err(e) => warn!("Boosted token feed unavailable: {}", e),
            }
        }

        let addresses = collect_addresses(&profiles, limit);
        debug!(
            "Discovery returned {} profiles, {} Solana candidates",
            profiles.len(),
            addresses.len()
        );
        Ok(addresses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_addresses_filters_and_dedups() {
        let json = r#"[
            {"chainId": "solana", "tokenAddress": "A", "url": "https://dexscreener.com/solana/a", "icon": "x"},
            {"chainId": "base", "tokenAddress": "B"},
            {"chainId": "solana", "tokenAddress": "C"},
            {"chainId": "solana", "tokenAddress": "A"},
            {"chainId": "solana", "tokenAddress": ""},
            {"chainId": "solana", "tokenAddress": "D"}
        ]"#;
        let profiles: Vec<TokenProfile> = serde_json::from_str(json).unwrap();

        assert_eq!(collect_addresses(&profiles, 10), vec!["A", "C", "D"]);
        assert_eq!(collect_addresses(&profiles, 2), vec!["A", "C"]);
    }

    #[test]
    fn test_provider_error_mapping() {
        assert!(matches!(
            DiscoveryError::from(ProviderError::RateLimited("x".into())),
            DiscoveryError::RateLimited
        ));
        assert!(matches!(
            DiscoveryError::from(ProviderError::Timeout),
            DiscoveryError::Request(_)
        ));
    }
}
