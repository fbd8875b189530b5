//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    Config, ConfigError, load_config, AggregatorSection, BlacklistSection, BlacklistSeed,
    DiscoverySection, LoggingSection, ProviderSection, ProvidersSection, RoutingSection,
    StorageSection,
};
