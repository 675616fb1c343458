//! Crawling pipeline: distribution, worker pool, and the entity writers
//!
//! Ingestion flows one way: the distributor snapshots a filtered player set
//! into the frontier, the pool drains it, and each worker fetches, parses,
//! and hands freshly-scraped facts to an idempotent writer that applies them
//! to both replicas.

mod distributor;
mod frontier;
mod pool;
mod roster;
mod runner;
mod seasons;
pub mod shots;

pub use distributor::{populate_frontier, FrontierFilters};
pub use frontier::Frontier;
pub use pool::{build_workers, run_pool, EntityWorker, PoolOptions, RunTally};
pub use roster::{split_roster_feed, sync_directory, tokenize_record, upsert_player, RosterSummary, RELEVANT_FROM_YEAR};
pub use runner::{execute, RunSummary};
pub use seasons::{merge_activity, parse_profile_activity, MergeStats, SeasonWorker};
pub use shots::{decode_shot_row, insert_shots, parse_shot_rows, ShotCrawlMode, ShotWorker};

/// The single decision an idempotent writer makes for one entity
///
/// Exactly one of these happens per entity per invocation; an insert is
/// never followed by an update in the same call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The key was absent; full facts were inserted
    Inserted,
    /// One or more fields differed; each got a targeted update
    Updated,
    /// Stored state already matches the scraped facts
    NoOp,
}
