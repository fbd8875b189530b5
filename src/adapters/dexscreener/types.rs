//! DexScreener API Types
//!
//! Raw response shapes. Every numeric field is optional and unknown fields
//! are ignored so additive API changes never break decoding.

use serde::Deserialize;

/// `GET /latest/dex/tokens/{address}`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPairsResponse {
    #[serde(default)]
    pub schema_version: Option<String>,
    /// `null` when the token has no pairs
    #[serde(default)]
    pub pairs: Option<Vec<DexPair>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub dex_id: String,
    #[serde(default)]
    pub pair_address: String,
    #[serde(default)]
    pub base_token: PairToken,
    #[serde(default)]
    pub quote_token: PairToken,
    /// Decimal string
    #[serde(default)]
    pub price_usd: Option<String>,
    #[serde(default)]
    pub txns: Option<Txns>,
    #[serde(default)]
    pub volume: Option<Windows>,
    #[serde(default)]
    pub price_change: Option<Windows>,
    #[serde(default)]
    pub liquidity: Option<Liquidity>,
    #[serde(default)]
    pub fdv: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    /// Unix milliseconds
    #[serde(default)]
    pub pair_created_at: Option<i64>,
}

impl DexPair {
    pub fn liquidity_usd(&self) -> Option<f64> {
        self.liquidity.as_ref().and_then(|l| l.usd)
    }

    pub fn price(&self) -> f64 {
        self.price_usd
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PairToken {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbol: String,
}

/// Per-timeframe values (`m5`, `h1`, `h6`, `h24`)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Windows {
    #[serde(default)]
    pub m5: Option<f64>,
    #[serde(default)]
    pub h1: Option<f64>,
    #[serde(default)]
    pub h6: Option<f64>,
    #[serde(default)]
    pub h24: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Txns {
    #[serde(default)]
    pub h1: Option<TxnCount>,
    #[serde(default)]
    pub h24: Option<TxnCount>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct TxnCount {
    #[serde(default)]
    pub buys: u64,
    #[serde(default)]
    pub sells: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Liquidity {
    #[serde(default)]
    pub usd: Option<f64>,
    #[serde(default)]
    pub base: Option<f64>,
    #[serde(default)]
    pub quote: Option<f64>,
}

/// Entry of `GET /token-profiles/latest/v1` and `GET /token-boosts/latest/v1`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenProfile {
    #[serde(default)]
    pub chain_id: String,
    #[serde(default)]
    pub token_address: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
