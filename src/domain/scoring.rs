//! Scoring Engine
//!
//! Deterministic weighted-point score for a `CombinedAnalysis`.
//!
//! Buckets and their fixed maxima:
//! - liquidity: 30
//! - volume: 25
//! - security: 25 (risk penalties subtracted, never a flat block)
//! - momentum: 20
//!
//! Tier thresholds are configuration. A missing stage scores zero in its
//! bucket and adds a recommendation.

use serde::{Deserialize, Serialize};

use super::analysis::{CombinedAnalysis, RiskLevel};

pub const LIQUIDITY_MAX: f64 = 30.0;
pub const VOLUME_MAX: f64 = 25.0;
pub const SECURITY_MAX: f64 = 25.0;
pub const MOMENTUM_MAX: f64 = 20.0;

/// `value >= min` earns `points`; tiers are checked highest first
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tier {
    pub min: f64,
    pub points: f64,
}

impl Tier {
    pub const fn new(min: f64, points: f64) -> Self {
        Self { min, points }
    }
}

/// Points for the first tier whose threshold `value` reaches
fn tier_points(tiers: &[Tier], value: f64) -> f64 {
    tiers
        .iter()
        .find(|tier| value >= tier.min)
        .map(|tier| tier.points)
        .unwrap_or(0.0)
}

/// Scoring thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Liquidity in USD; any positive liquidity below the lowest tier earns nothing
    #[serde(default = "default_liquidity_tiers")]
    pub liquidity_tiers: Vec<Tier>,
    /// 24h volume in USD
    #[serde(default = "default_volume_tiers")]
    pub volume_tiers: Vec<Tier>,
    /// Multiplier applied to the 0-10 safety score
    #[serde(default = "default_safety_multiplier")]
    pub safety_multiplier: f64,
    #[serde(default = "default_elevated_risk_penalty")]
    pub elevated_risk_penalty: f64,
    #[serde(default = "default_high_risk_penalty")]
    pub high_risk_penalty: f64,
    /// 24h price change in percent
    #[serde(default = "default_price_change_tiers")]
    pub price_change_tiers: Vec<Tier>,
    /// Buy share of 24h transactions, 0-1
    #[serde(default = "default_buy_pressure_tiers")]
    pub buy_pressure_tiers: Vec<Tier>,
}

fn default_liquidity_tiers() -> Vec<Tier> {
    vec![
        Tier::new(100_000.0, 30.0),
        Tier::new(50_000.0, 25.0),
        Tier::new(20_000.0, 20.0),
        Tier::new(10_000.0, 15.0),
        Tier::new(5_000.0, 10.0),
        Tier::new(f64::MIN_POSITIVE, 5.0),
    ]
}

fn default_volume_tiers() -> Vec<Tier> {
    vec![
        Tier::new(500_000.0, 25.0),
        Tier::new(100_000.0, 20.0),
        Tier::new(50_000.0, 15.0),
        Tier::new(10_000.0, 10.0),
        Tier::new(1_000.0, 5.0),
    ]
}

fn default_safety_multiplier() -> f64 {
    2.5
}

fn default_elevated_risk_penalty() -> f64 {
    5.0
}

fn default_high_risk_penalty() -> f64 {
    15.0
}

fn default_price_change_tiers() -> Vec<Tier> {
    vec![
        Tier::new(50.0, 12.0),
        Tier::new(20.0, 10.0),
        Tier::new(5.0, 7.0),
        Tier::new(0.0, 4.0),
        Tier::new(-10.0, 2.0),
    ]
}

fn default_buy_pressure_tiers() -> Vec<Tier> {
    vec![
        Tier::new(0.6, 8.0),
        Tier::new(0.5, 5.0),
        Tier::new(0.4, 2.0),
    ]
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            liquidity_tiers: default_liquidity_tiers(),
            volume_tiers: default_volume_tiers(),
            safety_multiplier: default_safety_multiplier(),
            elevated_risk_penalty: default_elevated_risk_penalty(),
            high_risk_penalty: default_high_risk_penalty(),
            price_change_tiers: default_price_change_tiers(),
            buy_pressure_tiers: default_buy_pressure_tiers(),
        }
    }
}

/// Per-bucket points plus the clamped total
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub liquidity: f64,
    pub volume: f64,
    pub security: f64,
    pub momentum: f64,
    pub total: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCard {
    pub breakdown: ScoreBreakdown,
    pub recommendations: Vec<String>,
}

/// Maps merged provider data to a 0-100 score
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score an analysis. Filter results are not consulted.
    pub fn score(&self, analysis: &CombinedAnalysis) -> ScoreCard {
        let mut recommendations = Vec::new();
        let mut breakdown = ScoreBreakdown::default();

        match analysis.market.data() {
            Some(market) => {
                breakdown.liquidity = self.liquidity_points(market.liquidity_usd);
                breakdown.volume = tier_points(&self.config.volume_tiers, market.volume_24h)
                    .clamp(0.0, VOLUME_MAX);
                breakdown.momentum = self.momentum_points(market.price_change_24h, market.buy_pressure());

                if market.liquidity_usd < 10_000.0 {
                    recommendations.push(format!(
                        "Thin liquidity (${:.0}): expect heavy price impact on exit",
                        market.liquidity_usd
                    ));
                }
                if market.market_cap > 0.0 && market.volume_24h > market.market_cap * 3.0 {
                    recommendations.push(
                        "Volume far exceeds market cap: check for wash trading".to_string(),
                    );
                }
                if market.price_change_24h <= -30.0 {
                    recommendations.push(format!(
                        "Price down {:.0}% in 24h",
                        market.price_change_24h.abs()
                    ));
                }
            }
            None => recommendations.push(
                "Market data unavailable: liquidity, volume and momentum not scored".to_string(),
            ),
        }

        match analysis.security.data() {
            Some(security) => {
                breakdown.security = if security.is_honeypot {
                    0.0
                } else {
                    let base = security.safety_score * self.config.safety_multiplier;
                    let penalty = match security.risk_level {
                        RiskLevel::Low => 0.0,
                        RiskLevel::Elevated => self.config.elevated_risk_penalty,
                        RiskLevel::High => self.config.high_risk_penalty,
                    };
                    (base - penalty).clamp(0.0, SECURITY_MAX)
                };

                if security.is_honeypot {
                    recommendations.push("Honeypot indicators present: do not buy".to_string());
                } else if security.risk_level == RiskLevel::High {
                    recommendations.push("High security risk reported".to_string());
                }
                if !security.mint_authority_revoked {
                    recommendations.push("Mint authority still active: supply can be inflated".to_string());
                }
                if !security.freeze_authority_revoked {
                    recommendations.push("Freeze authority still active".to_string());
                }
            }
            None => recommendations
                .push("Security data unavailable: verify contract manually".to_string()),
        }

        match analysis.routing.data() {
            Some(routing) if !routing.route_found => {
                recommendations.push("No swap route found from SOL".to_string())
            }
            Some(routing) if routing.slippage_pct > 5.0 => recommendations.push(format!(
                "High slippage ({:.1}%): size entries small",
                routing.slippage_pct
            )),
            Some(_) => {}
            None => recommendations.push("Routing data unavailable".to_string()),
        }

        match analysis.holders.data() {
            Some(holders) => {
                if holders.top_holders_percentage > 50.0 {
                    recommendations.push(format!(
                        "Top holders control {:.0}% of supply",
                        holders.top_holders_percentage
                    ));
                }
                if holders.creator_rugs > 0 {
                    recommendations.push(format!(
                        "Creator linked to {} previous rug(s)",
                        holders.creator_rugs
                    ));
                }
            }
            None => recommendations.push("Holder data unavailable".to_string()),
        }

        let raw = breakdown.liquidity + breakdown.volume + breakdown.security + breakdown.momentum;
        breakdown.total = raw.round().clamp(0.0, 100.0) as u8;

        ScoreCard {
            breakdown,
            recommendations,
        }
    }

    fn liquidity_points(&self, liquidity: f64) -> f64 {
        if liquidity <= 0.0 {
            return 0.0;
        }
        tier_points(&self.config.liquidity_tiers, liquidity).clamp(0.0, LIQUIDITY_MAX)
    }

    fn momentum_points(&self, price_change_24h: f64, buy_pressure: f64) -> f64 {
        let change = tier_points(&self.config.price_change_tiers, price_change_24h);
        let pressure = tier_points(&self.config.buy_pressure_tiers, buy_pressure);
        (change + pressure).clamp(0.0, MOMENTUM_MAX)
    }
}
