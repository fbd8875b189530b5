//! DexScreener Market Client
//!
//! Market stage provider. Fetches every pair for a token and normalizes the
//! most liquid Solana pair into `MarketData`.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tracing::debug;

use super::types::{DexPair, TokenPairsResponse};
use crate::adapters::provider::{fold_stage, ProviderError, ProviderHttp};
use crate::domain::{MarketData, ProviderId, ProviderResult, Stage};
use crate::ports::StageProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.dexscreener.com";

const SOLANA_CHAIN: &str = "solana";

/// DexScreener market data client
#[derive(Debug, Clone)]
pub struct DexScreenerClient {
    api_base_url: String,
    http: ProviderHttp,
}

impl DexScreenerClient {
    pub fn new(api_base_url: impl Into<String>, http: ProviderHttp) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    /// All pairs listing `address`
    pub async fn get_token_pairs(&self, address: &str) -> Result<TokenPairsResponse, ProviderError> {
        let url = format!("{}/latest/dex/tokens/{}", self.api_base_url, address);
        self.http.get(address, &url, &[]).await?.json()
    }

    /// Get the configured API base URL
    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }
}

/// Pick the most liquid Solana pair and map it into `MarketData`
pub fn normalize_pairs(address: &str, response: TokenPairsResponse) -> ProviderResult<MarketData> {
    let pairs: Vec<DexPair> = response
        .pairs
        .unwrap_or_default()
        .into_iter()
        .filter(|p| p.chain_id.is_empty() || p.chain_id == SOLANA_CHAIN)
        .collect();

    // Prefer pairs where the token is the base side
    let (own, other): (Vec<DexPair>, Vec<DexPair>) = pairs
        .into_iter()
        .partition(|p| p.base_token.address.is_empty() || p.base_token.address == address);
    let candidates = if own.is_empty() { other } else { own };

    let Some(pair) = candidates.into_iter().max_by(|a, b| {
        a.liquidity_usd()
            .unwrap_or(0.0)
            .total_cmp(&b.liquidity_usd().unwrap_or(0.0))
    }) else {
        return ProviderResult::filtered(MarketData::default(), "No trading pairs found");
    };

    let liquidity = pair.liquidity_usd();
    let volume = pair.volume.clone().unwrap_or_default();
    let change = pair.price_change.clone().unwrap_or_default();
    let txns_24h = pair
        .txns
        .as_ref()
        .and_then(|t| t.h24)
        .unwrap_or_default();

    let data = MarketData {
        pair_address: pair.pair_address.clone(),
        dex_id: pair.dex_id.clone(),
        symbol: pair.base_token.symbol.clone(),
        name: pair.base_token.name.clone(),
        price_usd: pair.price(),
        liquidity_usd: liquidity.unwrap_or(0.0),
        volume_24h: volume.h24.unwrap_or(0.0),
        market_cap: pair.market_cap.unwrap_or(0.0),
        fdv: pair.fdv.unwrap_or(0.0),
        price_change_1h: change.h1.unwrap_or(0.0),
        price_change_24h: change.h24.unwrap_or(0.0),
        buys_24h: txns_24h.buys,
        sells_24h: txns_24h.sells,
        pair_created_at: pair.pair_created_at.and_then(millis_to_datetime),
    };

    match liquidity {
        Some(_) => ProviderResult::ok(data),
        None => ProviderResult::filtered(data, "Liquidity data missing"),
    }
}

fn millis_to_datetime(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

#[async_trait]
impl StageProvider<MarketData> for DexScreenerClient {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Market
    }

    async fn fetch(&self, address: &str) -> Stage<MarketData> {
        let stage = fold_stage(
            self.get_token_pairs(address)
                .await
                .map(|response| Stage::Present(normalize_pairs(address, response))),
        );
        debug!("market stage for {}: present={}", address, stage.is_present());
        stage
    }
}
