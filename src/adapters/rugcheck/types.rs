//! RugCheck API Types

use serde::Deserialize;

/// `GET /v1/tokens/{mint}/report/summary`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    #[serde(default)]
    pub token_program: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub risks: Vec<Risk>,
    /// Raw additive risk score, unbounded
    #[serde(default)]
    pub score: Option<f64>,
    /// Risk score normalised to 0-100, higher is riskier
    #[serde(default, rename = "score_normalised")]
    pub score_normalised: Option<f64>,
    #[serde(default)]
    pub lp_locked_pct: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Risk {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub score: f64,
    /// `"danger"`, `"warn"` or `"info"`
    #[serde(default)]
    pub level: String,
}

impl Risk {
    pub fn severity(&self) -> u8 {
        match self.level.as_str() {
            "danger" => 2,
            "warn" => 1,
            _ => 0,
        }
    }

    pub fn mentions(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle) || self.description.to_lowercase().contains(needle)
    }
}
