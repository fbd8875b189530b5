//! Analysis Types
//!
//! Canonical per-provider data shapes and the merged `CombinedAnalysis`
//! that persistence and broadcast consume.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// External data source identity, also used as the rate-limit key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    /// Token discovery feed
    Discovery,
    /// Market / liquidity data
    Market,
    /// Security and honeypot checks
    Security,
    /// Swap routing / slippage quotes
    Routing,
    /// Holder and creator analytics
    Holders,
}

impl ProviderId {
    pub const STAGES: [ProviderId; 4] = [
        ProviderId::Market,
        ProviderId::Security,
        ProviderId::Routing,
        ProviderId::Holders,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Discovery => "discovery",
            ProviderId::Market => "market",
            ProviderId::Security => "security",
            ProviderId::Routing => "routing",
            ProviderId::Holders => "holders",
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized provider output plus the adapter's local verdict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResult<T> {
    pub data: T,
    /// Set when a required raw field was missing or the provider flagged the token
    pub filtered: bool,
    pub filter_reason: Option<String>,
}

impl<T> ProviderResult<T> {
    pub fn ok(data: T) -> Self {
        Self {
            data,
            filtered: false,
            filter_reason: None,
        }
    }

    pub fn filtered(data: T, reason: impl Into<String>) -> Self {
        Self {
            data,
            filtered: true,
            filter_reason: Some(reason.into()),
        }
    }
}

/// Why a stage produced no data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbsentKind {
    /// Retries exhausted on network errors / 5xx
    Transient,
    /// Non-retryable 4xx
    Permanent,
    /// Limiter wait would exceed the configured maximum
    RateLimited,
    /// Request timed out on every attempt
    Timeout,
    /// Response body did not match the expected schema
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsentReason {
    pub kind: AbsentKind,
    pub message: String,
}

impl AbsentReason {
    pub fn new(kind: AbsentKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// One provider's contribution to an analysis. Never silently omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Stage<T> {
    Present(ProviderResult<T>),
    Absent(AbsentReason),
}

impl<T> Stage<T> {
    pub fn present(data: T) -> Self {
        Stage::Present(ProviderResult::ok(data))
    }

    pub fn absent(kind: AbsentKind, message: impl Into<String>) -> Self {
        Stage::Absent(AbsentReason::new(kind, message))
    }

    pub fn is_present(&self) -> bool {
        matches!(self, Stage::Present(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Stage::Present(result) => Some(&result.data),
            Stage::Absent(_) => None,
        }
    }

    pub fn is_filtered(&self) -> bool {
        match self {
            Stage::Present(result) => result.filtered,
            Stage::Absent(_) => false,
        }
    }

    pub fn filter_reason(&self) -> Option<&str> {
        match self {
            Stage::Present(result) => result.filter_reason.as_deref(),
            Stage::Absent(_) => None,
        }
    }
}

/// Market and liquidity metrics for the most liquid pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub pair_address: String,
    pub dex_id: String,
    pub symbol: String,
    pub name: String,
    pub price_usd: f64,
    pub liquidity_usd: f64,
    pub volume_24h: f64,
    pub market_cap: f64,
    pub fdv: f64,
    pub price_change_1h: f64,
    pub price_change_24h: f64,
    pub buys_24h: u64,
    pub sells_24h: u64,
    pub pair_created_at: Option<DateTime<Utc>>,
}

impl MarketData {
    /// Pair age in hours at `now`, if the listing time is known
    pub fn age_hours(&self, now: DateTime<Utc>) -> Option<f64> {
        self.pair_created_at
            .map(|created| (now - created).num_seconds().max(0) as f64 / 3600.0)
    }

    /// Share of 24h transactions that were buys (0.5 when there were none)
    pub fn buy_pressure(&self) -> f64 {
        let total = self.buys_24h.saturating_add(self.sells_24h);
        if total == 0 {
            0.5
        } else {
            self.buys_24h as f64 / total as f64
        }
    }
}

/// Security risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Elevated,
    High,
}

/// Security report for a token mint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityData {
    /// 0 (unsafe) to 10 (clean)
    pub safety_score: f64,
    pub risk_level: RiskLevel,
    pub is_honeypot: bool,
    pub is_blacklisted: bool,
    pub mint_authority_revoked: bool,
    pub freeze_authority_revoked: bool,
    /// Provider risk descriptions, highest severity first
    pub risks: Vec<String>,
}

/// Swap route quote from SOL into the token
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingData {
    pub route_found: bool,
    /// Price impact in percent
    pub price_impact_pct: f64,
    /// Estimated execution slippage in percent
    pub slippage_pct: f64,
    pub hops: usize,
    pub dex_labels: Vec<String>,
    pub out_amount: u64,
}

/// Holder distribution and creator history
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HolderData {
    pub holder_count: u64,
    /// Supply share held by the top 10 holders, in percent
    pub top_holders_percentage: f64,
    pub creator_address: Option<String>,
    /// Previous tokens by the same creator that were rugged
    pub creator_rugs: u32,
    pub creator_tokens_created: u32,
}

/// Merged, scored and filtered result for one token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedAnalysis {
    pub address: String,
    pub market: Stage<MarketData>,
    pub security: Stage<SecurityData>,
    pub routing: Stage<RoutingData>,
    pub holders: Stage<HolderData>,
    pub overall_score: u8,
    pub passed: bool,
    /// Filter failures in evaluation order
    pub failed_filters: Vec<String>,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl CombinedAnalysis {
    /// Number of stages that returned data
    pub fn present_stages(&self) -> usize {
        [
            self.market.is_present(),
            self.security.is_present(),
            self.routing.is_present(),
            self.holders.is_present(),
        ]
        .iter()
        .filter(|p| **p)
        .count()
    }

    /// Symbol from market data, or a shortened address
    pub fn display_name(&self) -> String {
        match self.market.data() {
            Some(market) if !market.symbol.is_empty() => market.symbol.clone(),
            _ => self.address.chars().take(8).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_provider_id_names() {
        assert_eq!(ProviderId::Market.to_string(), "market");
        assert_eq!(ProviderId::Holders.as_str(), "holders");
        assert_eq!(ProviderId::STAGES.len(), 4);
    }

    #[test]
    fn test_stage_accessors() {
        let present: Stage<u32> = Stage::present(7);
        assert!(present.is_present());
        assert_eq!(present.data(), Some(&7));
        assert!(!present.is_filtered());

        let filtered: Stage<u32> = Stage::Present(ProviderResult::filtered(0, "missing"));
        assert!(filtered.is_filtered());
        assert_eq!(filtered.filter_reason(), Some("missing"));

        let absent: Stage<u32> = Stage::absent(AbsentKind::Timeout, "timed out");
        assert!(!absent.is_present());
        assert!(absent.data().is_none());
    }

    #[test]
    fn test_stage_serialization_is_tagged() {
        let absent: Stage<MarketData> = Stage::absent(AbsentKind::Permanent, "404");
        let json = serde_json::to_value(&absent).unwrap();
        assert_eq!(json["status"], "absent");
        assert_eq!(json["kind"], "permanent");
    }

    #[test]
    fn test_market_age_hours() {
        let now = Utc::now();
        let market = MarketData {
            pair_created_at: Some(now - Duration::hours(3)),
            ..Default::default()
        };
        let age = market.age_hours(now).unwrap();
        assert!((age - 3.0).abs() < 0.01);
        assert!(MarketData::default().age_hours(now).is_none());
    }

    #[test]
    fn test_buy_pressure() {
        let market = MarketData {
            buys_24h: 75,
            sells_24h: 25,
            ..Default::default()
        };
        assert!((market.buy_pressure() - 0.75).abs() < f64::EPSILON);
        assert!((MarketData::default().buy_pressure() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_buy_pressure_extreme_counts() {
        let market = MarketData {
            buys_24h: u64::MAX,
            sells_24h: u64::MAX,
            ..Default::default()
        };
        let pressure = market.buy_pressure();
        assert!((0.0..=1.0).contains(&pressure));
    }

    #[test]
    fn test_risk_level_ordering() {
        assert!(RiskLevel::High > RiskLevel::Elevated);
        assert!(RiskLevel::Elevated > RiskLevel::Low);
    }
}
