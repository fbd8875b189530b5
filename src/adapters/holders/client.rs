//! Holder Analytics Client
//!
//! Holder distribution and creator history from a REST analytics provider.
//! Liquidity pool accounts are excluded from the top-holder share.

use async_trait::async_trait;

use super::types::HoldersResponse;
use crate::adapters::provider::{fold_stage, ProviderError, ProviderHttp};
use crate::domain::{HolderData, ProviderId, ProviderResult, Stage};
use crate::ports::StageProvider;

/// Holders counted in the concentration figure
const TOP_HOLDERS: usize = 10;

#[derive(Debug, Clone)]
pub struct HolderAnalyticsClient {
    api_base_url: String,
    http: ProviderHttp,
}

impl HolderAnalyticsClient {
    pub fn new(api_base_url: impl Into<String>, api_key: Option<&str>, http: ProviderHttp) -> Self {
        let http = match api_key {
            Some(key) if !key.is_empty() => http.with_header("x-api-key", key),
            _ => http,
        };
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub async fn get_holders(&self, address: &str) -> Result<HoldersResponse, ProviderError> {
        let url = format!("{}/tokens/{}/holders", self.api_base_url, address);
        self.http.get(address, &url, &[]).await?.json()
    }
}

/// Map a holders response into `HolderData`
pub fn normalize_holders(response: HoldersResponse) -> ProviderResult<HolderData> {
    let computed = response.top_holders.as_ref().map(|holders| {
        holders
            .iter()
            .filter(|h| !h.is_liquidity_pool)
            .take(TOP_HOLDERS)
            .map(|h| h.percentage)
            .sum::<f64>()
    });
    let top_share = response.top10_percentage.or(computed);

    let creator = response.creator.unwrap_or_default();
    let data = HolderData {
        holder_count: response.holder_count.unwrap_or(0),
        top_holders_percentage: top_share.unwrap_or(0.0).clamp(0.0, 100.0),
        creator_address: creator.address,
        creator_rugs: creator.rug_count,
        creator_tokens_created: creator.tokens_created,
    };

    match top_share {
        Some(_) => ProviderResult::ok(data),
        None => ProviderResult::filtered(data, "Top holder data missing"),
    }
}

#[async_trait]
impl StageProvider<HolderData> for HolderAnalyticsClient {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Holders
    }

    async fn fetch(&self, address: &str) -> Stage<HolderData> {
        fold_stage(
            self.get_holders(address)
                .await
                .map(|response| Stage::Present(normalize_holders(response))),
        )
    }
}
