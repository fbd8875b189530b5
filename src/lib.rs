//! Butters Scout - Solana New-Token Aggregation Library
//!
//! Discovers freshly listed Solana tokens, enriches each one from four
//! independent providers, scores and filters the result, and persists the
//! tokens that pass.
//!
//! # Modules
//!
//! - `domain`: Core business logic (TokenCandidate, CombinedAnalysis, FilterCriteria, ScoringEngine, Blacklist)
//! - `ports`: Trait abstractions (StageProvider, DiscoveryFeed, AnalysisStore, Notifier)
//! - `adapters`: External implementations (DexScreener, RugCheck, Jupiter, holders, storage, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Analysis pipeline and aggregator

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
