//! Application Layer
//!
//! - `pipeline`: per-token analysis across the four provider stages
//! - `aggregator`: scheduled runs, persistence, blacklist and query surface
//! - `events`: broadcast event bus and notifier bridge
//! - `health`, `stats`, `processed`: bookkeeping owned by the aggregator

pub mod aggregator;
pub mod events;
pub mod health;
pub mod pipeline;
pub mod processed;
pub mod stats;

pub use aggregator::{Aggregator, AggregatorConfig, AggregatorError, ConfigUpdate, SystemStatus};
pub use events::{AggregatorEvent, EventBus, DEFAULT_EVENT_CAPACITY};
pub use health::{HealthStatus, HealthTracker, ProviderHealth, ProviderStatus};
pub use pipeline::{AnalysisPipeline, BatchOutcome, FailedAnalysis, PipelineError};
pub use processed::ProcessedSet;
pub use stats::{AggregatorStats, StatsTracker};
