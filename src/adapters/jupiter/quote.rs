//! Jupiter Quote Types
//!
//! Request and response structures for the Jupiter quote API.

use serde::{Deserialize, Serialize};

/// Request parameters for getting a swap quote
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    /// Input token mint address
    pub input_mint: String,
    /// Output token mint address
    pub output_mint: String,
    /// Amount in base units (lamports for SOL)
    pub amount: u64,
    /// Slippage tolerance in basis points (1 = 0.01%)
    pub slippage_bps: u16,
    /// Only use direct routes (no intermediate tokens)
    #[serde(default)]
    pub only_direct_routes: bool,
}

impl QuoteRequest {
    /// Create a new quote request with required parameters
    pub fn new(input_mint: String, output_mint: String, amount: u64, slippage_bps: u16) -> Self {
        Self {
            input_mint,
            output_mint,
            amount,
            slippage_bps,
            only_direct_routes: false,
        }
    }

    /// Query string pairs in the API's parameter names
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("inputMint", self.input_mint.clone()),
            ("outputMint", self.output_mint.clone()),
            ("amount", self.amount.to_string()),
            ("slippageBps", self.slippage_bps.to_string()),
        ];
        if self.only_direct_routes {
            query.push(("onlyDirectRoutes", "true".to_string()));
        }
        query
    }
}

/// Response from Jupiter quote API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    #[serde(default)]
    pub input_mint: String,
    #[serde(default)]
    pub output_mint: String,
    /// Input amount in base units
    #[serde(default)]
    pub in_amount: String,
    /// Output amount in base units, empty when the quote omitted it
    #[serde(default)]
    pub out_amount: String,
    /// Minimum output amount after slippage
    #[serde(default)]
    pub other_amount_threshold: String,
    #[serde(default)]
    pub swap_mode: String,
    #[serde(default)]
    pub slippage_bps: u16,
    /// Price impact as a fraction (0.01 = 1%)
    #[serde(default)]
    pub price_impact_pct: String,
    #[serde(default)]
    pub route_plan: Vec<RoutePlanStep>,
}

impl QuoteResponse {
    /// Output amount, `None` when missing or not a number
    pub fn parsed_output_amount(&self) -> Option<u64> {
        self.out_amount.parse().ok()
    }

    /// Get output amount as u64
    pub fn output_amount(&self) -> u64 {
        self.parsed_output_amount().unwrap_or(0)
    }

    /// Get minimum output amount as u64
    pub fn min_output_amount(&self) -> u64 {
        self.other_amount_threshold.parse().unwrap_or(0)
    }

    /// Price impact in percent
    pub fn price_impact_percent(&self) -> f64 {
        self.price_impact_pct.parse::<f64>().unwrap_or(0.0).abs() * 100.0
    }

    /// Price impact plus the slippage allowance baked into the minimum output, in percent
    pub fn worst_case_slippage_percent(&self) -> f64 {
        let out = self.output_amount();
        let tolerance = if out > 0 {
            (1.0 - self.min_output_amount() as f64 / out as f64).max(0.0) * 100.0
        } else {
            0.0
        };
        self.price_impact_percent() + tolerance
    }

    /// Distinct DEX labels along the route, in route order
    pub fn dex_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        for step in &self.route_plan {
            if !labels.contains(&step.swap_info.label) {
                labels.push(step.swap_info.label.clone());
            }
        }
        labels
    }
}

/// A step in the route plan
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlanStep {
    pub swap_info: SwapInfo,
    /// Percentage of the trade going through this route
    #[serde(default)]
    pub percent: u8,
}

/// Information about a single swap in the route
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInfo {
    #[serde(default)]
    pub amm_key: String,
    /// Label for the DEX (e.g., "Raydium", "Orca")
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub input_mint: String,
    #[serde(default)]
    pub output_mint: String,
}

/// Error body returned with HTTP 400
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub error_code: Option<String>,
}

impl QuoteErrorBody {
    /// The token simply cannot be routed, as opposed to a malformed request
    pub fn is_no_route(&self) -> bool {
        let code = self.error_code.as_deref().unwrap_or_default();
        matches!(
            code,
            "COULD_NOT_FIND_ANY_ROUTE" | "TOKEN_NOT_TRADABLE" | "NO_ROUTES_FOUND"
        ) || {
            let msg = self.error.to_lowercase();
            msg.contains("no route") || msg.contains("not tradable") || msg.contains("could not find any route")
        }
    }
}
