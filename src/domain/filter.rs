//! Admission Filter
//!
//! `FilterCriteria` is the immutable pass/fail policy applied to every
//! `CombinedAnalysis`. Conditions are evaluated in a fixed order and every
//! one of them runs, so the caller gets the full list of reasons.
//!
//! Evaluation order:
//! 1. age (min / max hours)
//! 2. liquidity
//! 3. 24h volume
//! 4. safety score
//! 5. honeypot
//! 6. blacklisted
//! 7. routing required
//! 8. slippage
//! 9. creator rugs
//! 10. top-holder concentration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::{CombinedAnalysis, ProviderId, Stage};
use super::token::ValidationError;

/// Admission criteria, snapshotted per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Reject pairs younger than this many hours
    #[serde(default)]
    pub min_age_hours: Option<f64>,
    /// Reject pairs older than this many hours
    #[serde(default)]
    pub max_age_hours: Option<f64>,
    /// Minimum pool liquidity in USD (0 disables)
    #[serde(default = "default_min_liquidity")]
    pub min_liquidity: f64,
    /// Minimum 24h volume in USD (0 disables)
    #[serde(default = "default_min_volume")]
    pub min_volume: f64,
    /// Minimum safety score, 0-10 (0 disables)
    #[serde(default = "default_min_safety_score")]
    pub min_safety_score: f64,
    #[serde(default)]
    pub allow_honeypot: bool,
    /// Maximum estimated slippage in percent
    #[serde(default = "default_max_slippage")]
    pub max_slippage: f64,
    #[serde(default = "default_require_routing")]
    pub require_routing: bool,
    #[serde(default)]
    pub allow_blacklisted: bool,
    #[serde(default = "default_max_creator_rugs")]
    pub max_creator_rugs: u32,
    /// Maximum supply share of the top 10 holders, in percent
    #[serde(default = "default_max_top_holders_percentage")]
    pub max_top_holders_percentage: f64,
}

fn default_min_liquidity() -> f64 {
    5_000.0
}

fn default_min_volume() -> f64 {
    1_000.0
}

fn default_min_safety_score() -> f64 {
    6.0
}

fn default_max_slippage() -> f64 {
    10.0
}

fn default_require_routing() -> bool {
    true
}

fn default_max_creator_rugs() -> u32 {
    2
}

fn default_max_top_holders_percentage() -> f64 {
    60.0
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self {
            min_age_hours: None,
            max_age_hours: None,
            min_liquidity: default_min_liquidity(),
            min_volume: default_min_volume(),
            min_safety_score: default_min_safety_score(),
            allow_honeypot: false,
            max_slippage: default_max_slippage(),
            require_routing: default_require_routing(),
            allow_blacklisted: false,
            max_creator_rugs: default_max_creator_rugs(),
            max_top_holders_percentage: default_max_top_holders_percentage(),
        }
    }
}

/// Which stage each condition reads
#[derive(Clone, Copy)]
enum Check {
    Age,
    Liquidity,
    Volume,
    SafetyScore,
    Honeypot,
    Blacklisted,
    Routing,
    Slippage,
    CreatorRugs,
    TopHolders,
}

const ORDER: [Check; 10] = [
    Check::Age,
    Check::Liquidity,
    Check::Volume,
    Check::SafetyScore,
    Check::Honeypot,
    Check::Blacklisted,
    Check::Routing,
    Check::Slippage,
    Check::CreatorRugs,
    Check::TopHolders,
];

impl Check {
    fn stage(self) -> ProviderId {
        match self {
            Check::Age | Check::Liquidity | Check::Volume => ProviderId::Market,
            Check::SafetyScore | Check::Honeypot | Check::Blacklisted => ProviderId::Security,
            Check::Routing | Check::Slippage => ProviderId::Routing,
            Check::CreatorRugs | Check::TopHolders => ProviderId::Holders,
        }
    }
}

impl FilterCriteria {
    /// Reject nonsensical thresholds before they reach a run
    pub fn validate(&self) -> Result<(), ValidationError> {
        let invalid = |msg: String| Err(ValidationError::InvalidConfig(msg));

        for (name, value) in [
            ("min_liquidity", self.min_liquidity),
            ("min_volume", self.min_volume),
            ("max_slippage", self.max_slippage),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{} must be a non-negative number, got {}", name, value));
            }
        }

        if !(0.0..=10.0).contains(&self.min_safety_score) {
            return invalid(format!(
                "min_safety_score must be 0-10, got {}",
                self.min_safety_score
            ));
        }

        if !(0.0..=100.0).contains(&self.max_top_holders_percentage) {
            return invalid(format!(
                "max_top_holders_percentage must be 0-100, got {}",
                self.max_top_holders_percentage
            ));
        }

        if let Some(min) = self.min_age_hours {
            if min < 0.0 {
                return invalid(format!("min_age_hours must be >= 0, got {}", min));
            }
        }

        if let (Some(min), Some(max)) = (self.min_age_hours, self.max_age_hours) {
            if min > max {
                return invalid(format!(
                    "min_age_hours ({}) must not exceed max_age_hours ({})",
                    min, max
                ));
            }
        }

        Ok(())
    }

    /// Evaluate every condition against `analysis`, returning failure reasons in order.
    ///
    /// An absent stage is reported once, as `"<stage> data unavailable"`, at the
    /// position of the first active condition that depends on it. A stage the
    /// adapter flagged as filtered fails the same way, reported with its own reason,
    /// since its data holds neutral defaults rather than real values.
    pub fn evaluate(&self, analysis: &CombinedAnalysis, now: DateTime<Utc>) -> Vec<String> {
        let mut reasons = Vec::new();
        let mut reported: Vec<ProviderId> = Vec::new();

        for check in ORDER {
            if !self.is_active(check) {
                continue;
            }

            let stage = check.stage();
            if let Some(reason) = unusable_stage(analysis, stage) {
                if !reported.contains(&stage) {
                    reported.push(stage);
                    reasons.push(reason);
                }
                continue;
            }

            if let Some(reason) = self.run_check(check, analysis, now) {
                reasons.push(reason);
            }
        }

        reasons
    }

    fn is_active(&self, check: Check) -> bool {
        match check {
            Check::Age => self.min_age_hours.is_some() || self.max_age_hours.is_some(),
            Check::Liquidity => self.min_liquidity > 0.0,
            Check::Volume => self.min_volume > 0.0,
            Check::SafetyScore => self.min_safety_score > 0.0,
            Check::Honeypot => !self.allow_honeypot,
            Check::Blacklisted => !self.allow_blacklisted,
            Check::Routing => self.require_routing,
            Check::Slippage | Check::CreatorRugs | Check::TopHolders => true,
        }
    }

    fn run_check(&self, check: Check, analysis: &CombinedAnalysis, now: DateTime<Utc>) -> Option<String> {
        match check {
            Check::Age => {
                let market = analysis.market.data()?;
                let Some(age) = market.age_hours(now) else {
                    return Some("Token age unknown".to_string());
                };
                if let Some(min) = self.min_age_hours {
                    if age < min {
                        return Some(format!("Token too new: {:.1}h < {:.1}h minimum", age, min));
                    }
                }
                if let Some(max) = self.max_age_hours {
                    if age > max {
                        return Some(format!("Token too old: {:.1}h > {:.1}h maximum", age, max));
                    }
                }
                None
            }
            Check::Liquidity => {
                let market = analysis.market.data()?;
                (market.liquidity_usd < self.min_liquidity).then(|| {
                    format!(
                        "Liquidity too low: ${:.0} < ${:.0}",
                        market.liquidity_usd, self.min_liquidity
                    )
                })
            }
            Check::Volume => {
                let market = analysis.market.data()?;
                (market.volume_24h < self.min_volume).then(|| {
                    format!(
                        "24h volume too low: ${:.0} < ${:.0}",
                        market.volume_24h, self.min_volume
                    )
                })
            }
            Check::SafetyScore => {
                let security = analysis.security.data()?;
                (security.safety_score < self.min_safety_score).then(|| {
                    format!(
                        "Safety score too low: {:.1} < {:.1}",
                        security.safety_score, self.min_safety_score
                    )
                })
            }
            Check::Honeypot => {
                let security = analysis.security.data()?;
                security.is_honeypot.then(|| "Honeypot detected".to_string())
            }
            Check::Blacklisted => {
                let security = analysis.security.data()?;
                security
                    .is_blacklisted
                    .then(|| "Token flagged as blacklisted".to_string())
            }
            Check::Routing => {
                let routing = analysis.routing.data()?;
                (!routing.route_found).then(|| "No swap route available".to_string())
            }
            Check::Slippage => {
                let routing = analysis.routing.data()?;
                // Slippage is meaningless without a route
                if !routing.route_found {
                    return None;
                }
                (routing.slippage_pct > self.max_slippage).then(|| {
                    format!(
                        "Slippage too high: {:.2}% > {:.2}%",
                        routing.slippage_pct, self.max_slippage
                    )
                })
            }
            Check::CreatorRugs => {
                let holders = analysis.holders.data()?;
                (holders.creator_rugs > self.max_creator_rugs).then(|| {
                    format!(
                        "Creator has {} rugged tokens (max {})",
                        holders.creator_rugs, self.max_creator_rugs
                    )
                })
            }
            Check::TopHolders => {
                let holders = analysis.holders.data()?;
                (holders.top_holders_percentage > self.max_top_holders_percentage).then(|| {
                    format!(
                        "Top holder concentration too high: {:.1}% > {:.1}%",
                        holders.top_holders_percentage, self.max_top_holders_percentage
                    )
                })
            }
        }
    }
}

/// Failure reason when `stage` cannot be trusted: absent, or flagged by its adapter
fn unusable_stage(analysis: &CombinedAnalysis, stage: ProviderId) -> Option<String> {
    match stage {
        ProviderId::Market => stage_verdict(&analysis.market, stage),
        ProviderId::Security => stage_verdict(&analysis.security, stage),
        ProviderId::Routing => stage_verdict(&analysis.routing, stage),
        ProviderId::Holders => stage_verdict(&analysis.holders, stage),
        ProviderId::Discovery => None,
    }
}

fn stage_verdict<T>(result: &Stage<T>, stage: ProviderId) -> Option<String> {
    match result {
        Stage::Absent(_) => Some(format!("{} data unavailable", stage)),
        Stage::Present(result) if result.filtered => Some(
            result
                .filter_reason
                .clone()
                .unwrap_or_else(|| format!("{} data incomplete", stage)),
        ),
        Stage::Present(_) => None,
    }
}
