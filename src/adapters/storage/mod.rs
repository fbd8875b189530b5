//! Analysis Store Adapters

mod jsonl;
mod memory;

pub use jsonl::{JsonlAnalysisStore, DEFAULT_HISTORY_PER_TOKEN};
pub use memory::MemoryAnalysisStore;
