//! DexScreener Adapter
//!
//! Market stage provider and the token discovery feed.

mod client;
mod discovery;
mod types;

pub use client::{normalize_pairs, DexScreenerClient, DEFAULT_BASE_URL};
pub use discovery::{collect_addresses, DexScreenerDiscovery};
pub use types::{DexPair, TokenPairsResponse, TokenProfile};
