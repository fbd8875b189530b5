//! RugCheck Adapter
//!
//! Security stage provider: safety score, risk level and honeypot flags.

mod client;
mod types;

pub use client::{normalize_report, RugCheckClient, DEFAULT_BASE_URL};
pub use types::{ReportSummary, Risk};
