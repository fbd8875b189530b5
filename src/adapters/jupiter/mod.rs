//! Jupiter Adapter
//!
//! Routing stage provider: SOL -> token quote, price impact and route shape.

mod client;
mod quote;

pub use client::{interpret_response, normalize_quote, JupiterClient, JupiterConfig, DEFAULT_BASE_URL};
pub use quote::{QuoteErrorBody, QuoteRequest, QuoteResponse, RoutePlanStep, SwapInfo};
