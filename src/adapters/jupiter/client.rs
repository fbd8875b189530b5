//! Jupiter API Client
//!
//! Routing stage provider. Asks Jupiter for a SOL -> token quote of a fixed
//! probe size and reports whether a route exists and what it would cost.
//! Quoting only; nothing here builds or sends a swap.

use async_trait::async_trait;
use tracing::debug;

use super::quote::{QuoteErrorBody, QuoteRequest, QuoteResponse};
use crate::adapters::provider::{fold_stage, ProviderError, ProviderHttp, RawResponse};
use crate::domain::{ProviderId, ProviderResult, RoutingData, Stage, SOL_MINT};
use crate::ports::StageProvider;

pub const DEFAULT_BASE_URL: &str = "https://api.jup.ag/swap/v1";

/// HTTP status Jupiter uses for unroutable tokens
const NO_ROUTE_STATUS: u16 = 400;

/// Jupiter quote settings
#[derive(Debug, Clone)]
pub struct JupiterConfig {
    /// Base URL for Jupiter API
    pub api_base_url: String,
    /// Optional API key for higher rate limits
    pub api_key: Option<String>,
    /// Probe size in lamports
    pub probe_amount_lamports: u64,
    /// Slippage tolerance in basis points
    pub slippage_bps: u16,
}

impl Default for JupiterConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            // 0.1 SOL
            probe_amount_lamports: 100_000_000,
            slippage_bps: 100,
        }
    }
}

/// Jupiter quote client
#[derive(Debug, Clone)]
pub struct JupiterClient {
    config: JupiterConfig,
    http: ProviderHttp,
}

impl JupiterClient {
    /// `http` is taught to accept the "no route" 400 and to send the API key
    pub fn new(mut config: JupiterConfig, http: ProviderHttp) -> Self {
        config.api_base_url = config.api_base_url.trim_end_matches('/').to_string();
        let mut http = http.with_handled_status(NO_ROUTE_STATUS);
        if let Some(ref api_key) = config.api_key {
            http = http.with_header("x-api-key", api_key);
        }
        Self { config, http }
    }

    /// Get a quote for buying `address` with SOL
    pub async fn get_quote(&self, address: &str) -> Result<RawResponse, ProviderError> {
        let request = QuoteRequest::new(
            SOL_MINT.to_string(),
            address.to_string(),
            self.config.probe_amount_lamports,
            self.config.slippage_bps,
        );
        let url = format!("{}/quote", self.config.api_base_url);
        self.http.get(address, &url, &request.query()).await
    }

    /// Get the configured API base URL
    pub fn api_base_url(&self) -> &str {
        &self.config.api_base_url
    }
}

/// Map a quote into `RoutingData`
pub fn normalize_quote(quote: &QuoteResponse) -> ProviderResult<RoutingData> {
    let data = RoutingData {
        route_found: !quote.route_plan.is_empty(),
        price_impact_pct: quote.price_impact_percent(),
        slippage_pct: quote.worst_case_slippage_percent(),
        hops: quote.route_plan.len(),
        dex_labels: quote.dex_labels(),
        out_amount: quote.output_amount(),
    };

    // An empty route plan is a complete answer; only a missing amount is not
    match quote.parsed_output_amount() {
        Some(_) => ProviderResult::ok(data),
        None => ProviderResult::filtered(data, "Quote output missing"),
    }
}

/// Turn a raw quote response (2xx or the handled 400) into a stage
pub fn interpret_response(response: &RawResponse) -> Result<Stage<RoutingData>, ProviderError> {
    if response.status == NO_ROUTE_STATUS {
        let body: QuoteErrorBody = response.json().unwrap_or_default();
        if body.is_no_route() {
            return Ok(Stage::present(RoutingData::default()));
        }
        return Err(ProviderError::Permanent {
            status: response.status,
            message: body.error,
        });
    }

    let quote: QuoteResponse = response.json()?;
    Ok(Stage::Present(normalize_quote(&quote)))
}

#[async_trait]
impl StageProvider<RoutingData> for JupiterClient {
    fn provider_id(&self) -> ProviderId {
        ProviderId::Routing
    }

    async fn fetch(&self, address: &str) -> Stage<RoutingData> {
        let stage = fold_stage(
            self.get_quote(address)
                .await
                .and_then(|response| interpret_response(&response)),
        );
        debug!("routing stage for {}: present={}", address, stage.is_present());
        stage
    }
}
