//! Configuration module for shotledger
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every recognized option is a named, typed field; unknown stage
//! names or store aliases cannot exist past boot.

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, ReconcileConfig, RunConfig, SeasonConfig, StoresConfig, UpstreamConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
