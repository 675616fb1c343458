//! Shared run environment passed to every component
//!
//! One [`Platform`] value is built at startup and handed to each stage by
//! dependency injection. It owns the validated configuration and the HTTP
//! client, and knows how to open replica pairs. Components never reach for
//! ambient state; everything they need arrives through here.

use crate::client::{self, FetchError};
use crate::config::Config;
use crate::model::SeasonType;
use crate::storage::{ReplicaPair, ReplicaStore, StoreError};
use crate::Result;
use reqwest::blocking::Client;
use std::sync::Arc;
use std::time::Duration;

/// Run-wide environment: configuration plus the external collaborators
pub struct Platform {
    config: Arc<Config>,
    client: Client,
}

impl Platform {
    /// Builds the platform from a validated configuration
    ///
    /// Fails only on HTTP client construction; replica connections are
    /// opened lazily per stage (and per worker thread) instead.
    pub fn new(config: Config) -> Result<Self> {
        let client = client::build_client(
            &config.upstream.origin,
            Duration::from_secs(config.upstream.timeout_secs),
        )?;
        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The in-progress season label, e.g. "2021-22"
    pub fn current_season(&self) -> &str {
        &self.config.season.current_season
    }

    /// The in-progress season type
    pub fn current_season_type(&self) -> SeasonType {
        self.config.season.season_type
    }

    /// Fetches a URL once through the shared client, with the configured jitter
    pub fn fetch(&self, url: &str) -> std::result::Result<String, FetchError> {
        client::fetch_once(&self.client, url, self.jitter_cap())
    }

    /// Fetches a URL, retrying transient failures up to the fixed cap
    pub fn fetch_with_retry(&self, url: &str) -> std::result::Result<String, FetchError> {
        client::fetch_with_retry(&self.client, url, self.jitter_cap())
    }

    /// Opens a fresh connection pair to the player replicas
    ///
    /// Each worker thread calls this for itself; connections are never
    /// shared across threads.
    pub fn open_players(&self) -> std::result::Result<ReplicaPair, StoreError> {
        Ok(ReplicaPair::new(
            ReplicaStore::open(&self.config.stores.players_primary, "players-primary")?,
            ReplicaStore::open(&self.config.stores.players_secondary, "players-secondary")?,
        ))
    }

    /// Opens a fresh connection pair to the shot replicas
    pub fn open_shots(&self) -> std::result::Result<ReplicaPair, StoreError> {
        Ok(ReplicaPair::new(
            ReplicaStore::open(&self.config.stores.shots_primary, "shots-primary")?,
            ReplicaStore::open(&self.config.stores.shots_secondary, "shots-secondary")?,
        ))
    }

    /// Builds the player profile URL for one player
    pub fn profile_url(&self, player_id: i64) -> String {
        client::profile_url(&self.config.upstream.stats_base, player_id)
    }

    /// Builds the shot chart URL for one player, season, and season type
    pub fn shot_chart_url(&self, season: &str, player_id: i64, season_type: SeasonType) -> String {
        client::shot_chart_url(
            &self.config.upstream.stats_base,
            season,
            player_id,
            season_type.url_param(),
        )
    }

    fn jitter_cap(&self) -> Duration {
        Duration::from_millis(self.config.upstream.jitter_cap_millis)
    }
}
