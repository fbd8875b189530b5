//! Holder Analytics API Types

use serde::Deserialize;

/// `GET /tokens/{address}/holders`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldersResponse {
    #[serde(default)]
    pub holder_count: Option<u64>,
    /// Largest holders, biggest first
    #[serde(default)]
    pub top_holders: Option<Vec<TopHolder>>,
    /// Pre-computed top-10 share, in percent
    #[serde(default, alias = "top10Pct")]
    pub top10_percentage: Option<f64>,
    #[serde(default)]
    pub creator: Option<CreatorInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopHolder {
    #[serde(default)]
    pub address: String,
    /// Share of supply in percent
    #[serde(default)]
    pub percentage: f64,
    #[serde(default)]
    pub is_liquidity_pool: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorInfo {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub rug_count: u32,
    #[serde(default)]
    pub tokens_created: u32,
}
