//! Shotledger: a dual-replica basketball shot ingestion pipeline
//!
//! This crate crawls player, team, and per-game shot data from a rate-limited
//! upstream statistics API and writes it into two independently-maintained
//! SQLite replicas, then reconciles the replicas against each other to detect
//! and optionally repair divergence.

pub mod client;
pub mod config;
pub mod crawl;
pub mod model;
pub mod platform;
pub mod reconcile;
pub mod storage;

use thiserror::Error;

/// Main error type for shotledger operations
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] client::FetchError),

    #[error("Store error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Unexpected response shape from {url}: {message}")]
    ResponseShape { url: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for shotledger operations
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{PlayerFacts, SeasonActivity, SeasonType, ShotRecord, TeamFacts};
pub use platform::Platform;
pub use storage::{ReplicaPair, ReplicaStore};
