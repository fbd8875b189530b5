//! Domain Layer - Core types and decision logic for the token scout
//!
//! Pure types and deterministic rules with no I/O. Everything that talks to
//! the outside world goes through the ports layer.
//!
//! - `token`: candidate addresses and address validation
//! - `analysis`: per-provider data shapes, `Stage` and `CombinedAnalysis`
//! - `filter`: ordered admission criteria
//! - `scoring`: weighted 0-100 score and recommendations
//! - `alerts`: alert rules raised for passing tokens
//! - `blacklist`: blocked addresses and the auto-blacklist policy
//! - `run`: aggregation run lifecycle and history

pub mod token;
pub mod analysis;
pub mod filter;
pub mod scoring;
pub mod alerts;
pub mod blacklist;
pub mod run;

pub use token::{validate_address, TokenCandidate, ValidationError, SOL_MINT};
pub use analysis::{
    AbsentKind, AbsentReason, CombinedAnalysis, HolderData, MarketData, ProviderId,
    ProviderResult, RiskLevel, RoutingData, SecurityData, Stage,
};
pub use filter::FilterCriteria;
pub use scoring::{ScoreBreakdown, ScoreCard, ScoringConfig, ScoringEngine, Tier};
pub use alerts::{Alert, AlertConfig, AlertSeverity, AlertType};
pub use blacklist::{Blacklist, BlacklistEntry, BlacklistPolicy};
pub use run::{AggregationRun, RunHistory, RunStatus};
