//! Ports Layer - Trait definitions for external dependencies
//!
//! Following hexagonal architecture, these traits abstract:
//! - Per-stage data providers (market, security, routing, holders)
//! - The token discovery feed
//! - Analysis persistence
//! - Event delivery

pub mod providers;
pub mod discovery;
pub mod storage;
pub mod notifier;
pub mod mocks;

pub use providers::{ProviderSet, StageProvider};
pub use discovery::{DiscoveryError, DiscoveryFeed};
pub use storage::{AnalysisStore, StoreError};
pub use notifier::{EventEnvelope, Notifier, NotifyError};
