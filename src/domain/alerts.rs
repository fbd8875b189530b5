//! Alert Rules
//!
//! Independent, deterministic rules evaluated against a passing analysis.
//! Alerts are values; delivery belongs to whoever subscribes to the event bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use super::analysis::{CombinedAnalysis, RiskLevel};
use super::token::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    NewToken,
    PriceSpike,
    VolumeSpike,
    SecurityRisk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// A raised alert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub token_address: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub message: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

impl Alert {
    fn new(
        analysis: &CombinedAnalysis,
        alert_type: AlertType,
        severity: AlertSeverity,
        message: String,
        data: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token_address: analysis.address.clone(),
            alert_type,
            severity,
            message,
            data,
            timestamp: now,
            acknowledged: false,
        }
    }
}

/// Alert thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Pairs younger than this raise a new-token alert
    #[serde(default = "default_new_token_max_age_hours")]
    pub new_token_max_age_hours: f64,
    /// 24h change (percent) that raises a price-spike warning
    #[serde(default = "default_price_spike_pct")]
    pub price_spike_pct: f64,
    /// 24h change (percent) that escalates the price spike to critical
    #[serde(default = "default_price_spike_critical_pct")]
    pub price_spike_critical_pct: f64,
    /// 24h volume as a multiple of market cap
    #[serde(default = "default_volume_spike_multiple")]
    pub volume_spike_multiple: f64,
    #[serde(default = "default_enabled")]
    pub security_risk: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_new_token_max_age_hours() -> f64 {
    1.0
}

fn default_price_spike_pct() -> f64 {
    50.0
}

fn default_price_spike_critical_pct() -> f64 {
    200.0
}

fn default_volume_spike_multiple() -> f64 {
    2.0
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            new_token_max_age_hours: default_new_token_max_age_hours(),
            price_spike_pct: default_price_spike_pct(),
            price_spike_critical_pct: default_price_spike_critical_pct(),
            volume_spike_multiple: default_volume_spike_multiple(),
            security_risk: default_enabled(),
        }
    }
}

impl AlertConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.price_spike_critical_pct < self.price_spike_pct {
            return Err(ValidationError::InvalidConfig(format!(
                "price_spike_critical_pct ({}) must be >= price_spike_pct ({})",
                self.price_spike_critical_pct, self.price_spike_pct
            )));
        }
        if self.volume_spike_multiple <= 0.0 {
            return Err(ValidationError::InvalidConfig(format!(
                "volume_spike_multiple must be > 0, got {}",
                self.volume_spike_multiple
            )));
        }
        Ok(())
    }

    /// Run every rule, in a stable order
    pub fn evaluate(&self, analysis: &CombinedAnalysis, now: DateTime<Utc>) -> Vec<Alert> {
        if !self.enabled {
            return Vec::new();
        }

        let mut alerts = Vec::new();

        if let Some(market) = analysis.market.data() {
            if let Some(age) = market.age_hours(now) {
                if age < self.new_token_max_age_hours {
                    alerts.push(Alert::new(
                        analysis,
                        AlertType::NewToken,
                        AlertSeverity::Info,
                        format!("New token {} listed {:.1}h ago", analysis.display_name(), age),
                        json!({ "age_hours": age, "liquidity_usd": market.liquidity_usd }),
                        now,
                    ));
                }
            }

            let change = market.price_change_24h;
            if change > self.price_spike_pct {
                let severity = if change > self.price_spike_critical_pct {
                    AlertSeverity::Critical
                } else {
                    AlertSeverity::Warning
                };
                alerts.push(Alert::new(
                    analysis,
                    AlertType::PriceSpike,
                    severity,
                    format!("{} up {:.1}% in 24h", analysis.display_name(), change),
                    json!({ "price_change_24h": change, "price_usd": market.price_usd }),
                    now,
                ));
            }

            if market.market_cap > 0.0
                && market.volume_24h > market.market_cap * self.volume_spike_multiple
            {
                let multiple = market.volume_24h / market.market_cap;
                alerts.push(Alert::new(
                    analysis,
                    AlertType::VolumeSpike,
                    AlertSeverity::Warning,
                    format!(
                        "{} traded {:.1}x its market cap in 24h",
                        analysis.display_name(),
                        multiple
                    ),
                    json!({
                        "volume_24h": market.volume_24h,
                        "market_cap": market.market_cap,
                        "multiple": multiple,
                    }),
                    now,
                ));
            }
        }

        if self.security_risk {
            if let Some(security) = analysis.security.data() {
                if security.risk_level == RiskLevel::High {
                    alerts.push(Alert::new(
                        analysis,
                        AlertType::SecurityRisk,
                        AlertSeverity::Critical,
                        format!("{} flagged high risk", analysis.display_name()),
                        json!({
                            "safety_score": security.safety_score,
                            "risks": security.risks,
                        }),
                        now,
                    ));
                }
            }
        }

        alerts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analysis::{
        AbsentKind, HolderData, MarketData, RoutingData, SecurityData, Stage,
    };
    use chrono::Duration;

    fn analysis(market: MarketData, risk: RiskLevel) -> CombinedAnalysis {
        CombinedAnalysis {
            address: "7xKXtg2CW87d97TXJSDpbD5jBkheTqA83TZRuJosgAsU".to_string(),
            market: Stage::present(market),
            security: Stage::present(SecurityData {
                safety_score: 5.0,
                risk_level: risk,
                ..Default::default()
            }),
            routing: Stage::present(RoutingData::default()),
            holders: Stage::present(HolderData::default()),
            overall_score: 50,
            passed: true,
            failed_filters: Vec::new(),
            recommendations: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    fn quiet_market(now: DateTime<Utc>) -> MarketData {
        MarketData {
            symbol: "TEST".to_string(),
            pair_created_at: Some(now - Duration::hours(24)),
            price_change_24h: 5.0,
            volume_24h: 10_000.0,
            market_cap: 100_000.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_quiet_token_raises_nothing() {
        let now = Utc::now();
        let alerts = AlertConfig::default().evaluate(&analysis(quiet_market(now), RiskLevel::Low), now);
        assert!(alerts.is_empty());
    }

    #[test]
    fn test_new_token_alert() {
        let now = Utc::now();
        let market = MarketData {
            pair_created_at: Some(now - Duration::minutes(20)),
            ..quiet_market(now)
        };
        let alerts = AlertConfig::default().evaluate(&analysis(market, RiskLevel::Low), now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::NewToken);
        assert_eq!(alerts[0].severity, AlertSeverity::Info);
        assert!(!alerts[0].acknowledged);
    }

    #[test]
    fn test_price_spike_escalates() {
        let now = Utc::now();
        let config = AlertConfig::default();

        let market = MarketData {
            price_change_24h: 80.0,
            ..quiet_market(now)
        };
        let alerts = config.evaluate(&analysis(market, RiskLevel::Low), now);
        assert_eq!(alerts[0].alert_type, AlertType::PriceSpike);
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);

        let market = MarketData {
            price_change_24h: 350.0,
            ..quiet_market(now)
        };
        let alerts = config.evaluate(&analysis(market, RiskLevel::Low), now);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
        assert_eq!(alerts[0].data["price_change_24h"], 350.0);
    }

    #[test]
    fn test_volume_spike() {
        let now = Utc::now();
        let market = MarketData {
            volume_24h: 300_000.0,
            ..quiet_market(now)
        };
        let alerts = AlertConfig::default().evaluate(&analysis(market, RiskLevel::Low), now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::VolumeSpike);
        assert!(alerts[0].message.contains("3.0x"));
    }

    #[test]
    fn test_security_risk_alert() {
        let now = Utc::now();
        let alerts = AlertConfig::default().evaluate(&analysis(quiet_market(now), RiskLevel::High), now);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::SecurityRisk);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);

        let config = AlertConfig {
            security_risk: false,
            ..Default::default()
        };
        assert!(config.evaluate(&analysis(quiet_market(now), RiskLevel::High), now).is_empty());
    }

    #[test]
    fn test_absent_market_skips_market_rules() {
        let now = Utc::now();
        let mut a = analysis(quiet_market(now), RiskLevel::Low);
        a.market = Stage::absent(AbsentKind::Timeout, "timeout");
        assert!(AlertConfig::default().evaluate(&a, now).is_empty());
    }

    #[test]
    fn test_disabled() {
        let now = Utc::now();
        let config = AlertConfig {
            enabled: false,
            ..Default::default()
        };
        assert!(config.evaluate(&analysis(quiet_market(now), RiskLevel::High), now).is_empty());
    }

    #[test]
    fn test_validate() {
        assert!(AlertConfig::default().validate().is_ok());
        let bad = AlertConfig {
            price_spike_pct: 100.0,
            price_spike_critical_pct: 50.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
