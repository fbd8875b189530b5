//! RugCheck Security Client
//!
//! Security stage provider backed by the RugCheck report summary.
//! The normalised risk score (0-100, higher is worse) becomes a 0-10 safety
//! score, and the risk list drives the honeypot / authority flags.

use async_trait::async_trait;

use super::types::ReportSummary;
use crate::adapters::provider::{fold_stage, ProviderError, ProviderHttp};
use crate::domain::{ProviderId, ProviderResult, RiskLevel, SecurityData, Stage};
use crate::ports::StageProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.rugcheck.xyz";

#[derive(Debug, Clone)]
pub struct RugCheckClient {
    api_base_url: String,
    http: ProviderHttp,
}

impl RugCheckClient {
    pub fn new(api_base_url: impl Into<String>, http: ProviderHttp) -> Self {
        Self {
            api_base_url: api_base_url.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    pub async fn get_report_summary(&self, address: &str) -> Result<ReportSummary, ProviderError> {
        let url = format!("{}/v1/tokens/{}/report/summary", self.api_base_url, address);
        self.http.get(address, &url, &[]).await?.json()
    }
}

/// Map a report summary into `SecurityData`
pub fn normalize_report(mut report: ReportSummary) -> ProviderResult<SecurityData> {
    report.risks.sort_by(|a, b| b.severity().cmp(&a.severity()));

    let risk_level = match report.risks.iter().map(|r| r.severity()).max() {
        Some(2) => RiskLevel::High,
        Some(1) => RiskLevel::Elevated,
        _ => RiskLevel::Low,
    };

    let is_honeypot = report.risks.iter().any(|r| {
        r.mentions("honeypot") || (r.severity() == 2 && r.mentions("freeze authority"))
    });
    let is_blacklisted = report
        .risks
        .iter()
        .any(|r| r.mentions("blacklist") || r.mentions("rugged"));
    let mint_authority_revoked = !report.risks.iter().any(|r| r.mentions("mint authority"));
    let freeze_authority_revoked = !report.risks.iter().any(|r| r.mentions("freeze authority"));

    let safety_score = report
        .score_normalised
        .map(|normalised| (10.0 - normalised / 10.0).clamp(0.0, 10.0));

    let data = SecurityData {
        safety_score: safety_score.unwrap_or(0.0),
        risk_level,
        is_honeypot,
        is_blacklisted,
        mint_authority_revoked,
        freeze_authority_revoked,
        risks: report.risks.iter().map(|r| r.name.clone()).collect(),
    };

    match safety_score {
        Some(_) => ProviderResult::ok(data),
        None => ProviderResult::filtered(data, "Safety score missing"),
    }
}

#[async_trait]
impl StageProvider<SecurityData> for RugCheckClient {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Security
    }

    async fn fetch(&self, address: &str) -> Stage<SecurityData> {
        fold_stage(
            self.get_report_summary(address)
                .await
                .map(|report| Stage::Present(normalize_report(report))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> ReportSummary {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_clean_token() {
        let report = parse(
            r#"{"tokenProgram": "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA", "tokenType": "",
                "risks": [], "score": 1, "score_normalised": 1, "lpLockedPct": 100}"#,
        );
        let result = normalize_report(report);
        assert!(!result.filtered);
        assert!((result.data.safety_score - 9.9).abs() < 1e-9);
        assert_eq!(result.data.risk_level, RiskLevel::Low);
        assert!(!result.data.is_honeypot);
        assert!(result.data.mint_authority_revoked);
        assert!(result.data.freeze_authority_revoked);
    }

    #[test]
    fn test_risky_token() {
        let report = parse(
            r#"{"risks": [
                    {"name": "Low Liquidity", "value": "$120", "description": "Low amount of liquidity", "score": 1000, "level": "warn"},
                    {"name": "Freeze Authority still enabled", "value": "", "description": "Tokens can be frozen", "score": 7500, "level": "danger"},
                    {"name": "Mint Authority still enabled", "value": "", "description": "More tokens can be minted", "score": 5000, "level": "danger"}
                ],
                "score": 13500, "score_normalised": 65}"#,
        );
        let result = normalize_report(report);
        let data = result.data;
        assert!((data.safety_score - 3.5).abs() < 1e-9);
        assert_eq!(data.risk_level, RiskLevel::High);
        assert!(data.is_honeypot);
        assert!(!data.mint_authority_revoked);
        assert!(!data.freeze_authority_revoked);
        // highest severity first
        assert_eq!(data.risks.last().map(String::as_str), Some("Low Liquidity"));
    }

    #[test]
    fn test_missing_score_is_filtered() {
        let result = normalize_report(parse(r#"{"risks": [{"name": "Mutable metadata", "level": "warn"}]}"#));
        assert!(result.filtered);
        assert_eq!(result.filter_reason.as_deref(), Some("Safety score missing"));
        assert_eq!(result.data.safety_score, 0.0);
        assert_eq!(result.data.risk_level, RiskLevel::Elevated);
    }

    #[test]
    fn test_score_is_clamped() {
        let result = normalize_report(parse(r#"{"score_normalised": 250}"#));
        assert_eq!(result.data.safety_score, 0.0);
    }
}
