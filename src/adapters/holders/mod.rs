//! Holder Analytics Adapter

mod client;
mod types;

pub use client::{normalize_holders, HolderAnalyticsClient};
pub use types::{CreatorInfo, HoldersResponse, TopHolder};
