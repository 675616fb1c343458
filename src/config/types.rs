use crate::model::SeasonType;
use serde::Deserialize;

/// Main configuration structure for shotledger
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    pub stores: StoresConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub season: SeasonConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

/// Upstream API endpoints and request behavior
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL for the stats API (player profiles, shot charts)
    #[serde(rename = "stats-base", default = "default_stats_base")]
    pub stats_base: String,

    /// URL of the combined team/player roster feed
    #[serde(rename = "roster-url", default = "default_roster_url")]
    pub roster_url: String,

    /// Origin/Referer the upstream expects on every request
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Request timeout in seconds
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Upper bound of the random pre-request delay (milliseconds)
    #[serde(rename = "jitter-cap-millis", default = "default_jitter_cap")]
    pub jitter_cap_millis: u64,
}

/// Paths to the four replica database files
///
/// Players and shots live in separate databases; each has a primary and a
/// secondary replica that are written independently and reconciled later.
#[derive(Debug, Clone, Deserialize)]
pub struct StoresConfig {
    #[serde(rename = "players-primary")]
    pub players_primary: String,

    #[serde(rename = "players-secondary")]
    pub players_secondary: String,

    #[serde(rename = "shots-primary")]
    pub shots_primary: String,

    #[serde(rename = "shots-secondary")]
    pub shots_secondary: String,
}

/// Worker pool and pacing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Number of worker threads; defaults to available hardware parallelism
    #[serde(rename = "worker-count")]
    pub worker_count: Option<usize>,

    /// Delay between successive worker thread starts for season crawls (seconds)
    #[serde(rename = "season-stagger-secs", default = "default_season_stagger")]
    pub season_stagger_secs: u64,

    /// Delay between successive worker thread starts for shot crawls (seconds)
    #[serde(rename = "shot-stagger-secs", default = "default_shot_stagger")]
    pub shot_stagger_secs: u64,

    /// Upper bound of the between-entity pause for season crawls (milliseconds)
    #[serde(rename = "season-pause-cap-millis", default = "default_season_pause")]
    pub season_pause_cap_millis: u64,

    /// Upper bound of the between-entity pause for shot crawls (milliseconds)
    #[serde(rename = "shot-pause-cap-millis", default = "default_shot_pause")]
    pub shot_pause_cap_millis: u64,
}

/// Current-season context shared by filters, crawlers, and the reconciler
#[derive(Debug, Clone, Deserialize)]
pub struct SeasonConfig {
    /// The in-progress season, as a `YYYY-YY` label (e.g. "2021-22")
    #[serde(rename = "current-season")]
    pub current_season: String,

    /// Which portion of the current season is being played right now
    #[serde(rename = "season-type", default)]
    pub season_type: SeasonType,

    /// Player ids excluded from every frontier (upstream has no data for them)
    #[serde(rename = "skip-players", default)]
    pub skip_players: Vec<i64>,
}

/// Which stages a run executes, in pipeline order
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    /// Refresh the team and player directory tables from the roster feed
    #[serde(rename = "sync-directory", default)]
    pub sync_directory: bool,

    /// First-time season-activity crawl over every player (resumable)
    #[serde(rename = "backfill-seasons", default)]
    pub backfill_seasons: bool,

    /// Incremental season-activity crawl over currently-active players
    #[serde(rename = "update-seasons", default)]
    pub update_seasons: bool,

    /// First-time shot crawl over every player (resumable)
    #[serde(rename = "backfill-shots", default)]
    pub backfill_shots: bool,

    /// Incremental shot crawl for the current season and season type
    #[serde(rename = "update-shots", default)]
    pub update_shots: bool,

    /// Diff the two player replicas
    #[serde(rename = "reconcile-players", default)]
    pub reconcile_players: bool,

    /// Diff the two shot replicas
    #[serde(rename = "reconcile-shots", default)]
    pub reconcile_shots: bool,

    /// Row diffs compare full row contents instead of unique keys only
    #[serde(rename = "exact-rows", default)]
    pub exact_rows: bool,

    /// Drop mismatched tables from the primary replica so a re-crawl refills them
    #[serde(rename = "drop-mismatched", default)]
    pub drop_mismatched: bool,

    /// Drop empty per-season shot tables so a re-run recreates them
    #[serde(rename = "sweep-empty-shot-tables", default)]
    pub sweep_empty_shot_tables: bool,
}

/// Reconciliation tuning
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconcileConfig {
    /// Tables with accepted historical discrepancies; never flagged mismatched
    #[serde(rename = "known-discrepancies", default)]
    pub known_discrepancies: Vec<String>,

    /// Row content marking an in-progress season; defaults to the current season
    #[serde(rename = "incomplete-season-marker")]
    pub incomplete_season_marker: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            stats_base: default_stats_base(),
            roster_url: default_roster_url(),
            origin: default_origin(),
            timeout_secs: default_timeout_secs(),
            jitter_cap_millis: default_jitter_cap(),
        }
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            season_stagger_secs: default_season_stagger(),
            shot_stagger_secs: default_shot_stagger(),
            season_pause_cap_millis: default_season_pause(),
            shot_pause_cap_millis: default_shot_pause(),
        }
    }
}

impl Config {
    /// Effective worker count: the configured value or host CPU count
    pub fn worker_count(&self) -> usize {
        self.crawler.worker_count.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// The marker string used by the reconciler's incomplete-season exception
    pub fn incomplete_season_marker(&self) -> &str {
        self.reconcile
            .incomplete_season_marker
            .as_deref()
            .unwrap_or(&self.season.current_season)
    }
}

fn default_stats_base() -> String {
    "https://stats.nba.com/stats".to_string()
}

fn default_roster_url() -> String {
    "https://www.nba.com/stats/js/data/ptsd/stats_ptsd.js".to_string()
}

fn default_origin() -> String {
    "https://www.nba.com".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_jitter_cap() -> u64 {
    20_000
}

fn default_season_stagger() -> u64 {
    15
}

fn default_shot_stagger() -> u64 {
    5
}

fn default_season_pause() -> u64 {
    20_000
}

fn default_shot_pause() -> u64 {
    10_000
}
