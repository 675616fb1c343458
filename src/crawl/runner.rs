//! Stage orchestration for one run
//!
//! Executes whichever stages the run configuration enables, in pipeline
//! order: directory sync, season crawls, shot crawls, reconciliation, and
//! maintenance sweeps. Entity-level failures stay inside the pool; anything
//! that escapes to here (bad config, unopenable replica, unusable roster
//! feed) aborts the run.

use crate::crawl::distributor::{populate_frontier, FrontierFilters};
use crate::crawl::pool::{build_workers, run_pool, PoolOptions, RunTally};
use crate::crawl::roster::sync_directory;
use crate::crawl::seasons::SeasonWorker;
use crate::crawl::shots::{ShotCrawlMode, ShotWorker};
use crate::config::Config;
use crate::platform::Platform;
use crate::reconcile::{reconcile, ReconcileOptions, RowDiffMode, TableScope};
use crate::storage::PLAYER_RELEVANT_TABLE;
use crate::Result;
use std::sync::Arc;
use std::time::Duration;

/// Aggregate results of one run
#[derive(Debug, Default)]
pub struct RunSummary {
    pub players_processed: u64,
    pub players_skipped: u64,
    pub new_shots: u64,
    pub tables_dropped: u64,
}

/// Executes the configured stages and returns the aggregate tally
pub fn execute(config: Config) -> Result<RunSummary> {
    let platform = Arc::new(Platform::new(config)?);
    let run = platform.config().run.clone();
    let mut summary = RunSummary::default();

    if run.sync_directory {
        let players = platform.open_players()?;
        sync_directory(&platform, &players)?;
    }

    if run.backfill_seasons {
        let tally = run_season_pool(&platform, FrontierFilters::backfill())?;
        absorb(&mut summary, &tally);
    }
    if run.update_seasons {
        let tally = run_season_pool(&platform, FrontierFilters::current_season())?;
        absorb(&mut summary, &tally);
    }

    if run.backfill_shots {
        let tally = run_shot_pool(&platform, FrontierFilters::everyone(), ShotCrawlMode::Backfill)?;
        absorb(&mut summary, &tally);
    }
    if run.update_shots {
        let tally = run_shot_pool(
            &platform,
            FrontierFilters::current_season(),
            ShotCrawlMode::CurrentSeason,
        )?;
        absorb(&mut summary, &tally);
    }

    if run.reconcile_players {
        let players = platform.open_players()?;
        let options = reconcile_options(&platform, TableScope::Players)?;
        let report = reconcile(&players, TableScope::Players, &options)?;
        summary.tables_dropped += report.dropped_tables.len() as u64;
    }
    if run.reconcile_shots {
        let shots = platform.open_shots()?;
        let options = reconcile_options(&platform, TableScope::Shots)?;
        let report = reconcile(&shots, TableScope::Shots, &options)?;
        summary.tables_dropped += report.dropped_tables.len() as u64;
    }

    if run.sweep_empty_shot_tables {
        summary.tables_dropped += sweep_empty_shot_tables(&platform)?;
    }

    tracing::info!(
        "End of run: {} players processed, {} skipped, {} new shots, {} tables dropped",
        summary.players_processed,
        summary.players_skipped,
        summary.new_shots,
        summary.tables_dropped
    );
    Ok(summary)
}

fn absorb(summary: &mut RunSummary, tally: &RunTally) {
    summary.players_processed += tally.processed();
    summary.players_skipped += tally.skipped();
    summary.new_shots += tally.new_shots();
}

/// Distributes the frontier and drains it with season workers
fn run_season_pool(platform: &Arc<Platform>, filters: FrontierFilters) -> Result<Arc<RunTally>> {
    let config = platform.config();
    let frontier = {
        let players = platform.open_players()?;
        Arc::new(populate_frontier(
            &players.primary,
            &filters,
            &config.season.current_season,
            &config.season.skip_players,
        )?)
    };

    let workers = build_workers(config.worker_count(), |_| {
        SeasonWorker::new(Arc::clone(platform))
    })?;
    let options = PoolOptions {
        stagger: Duration::from_secs(config.crawler.season_stagger_secs),
        pause_cap: Duration::from_millis(config.crawler.season_pause_cap_millis),
    };

    let tally = Arc::new(RunTally::default());
    run_pool(frontier, Arc::clone(&tally), &options, workers);
    Ok(tally)
}

/// Distributes the frontier and drains it with shot workers
fn run_shot_pool(
    platform: &Arc<Platform>,
    filters: FrontierFilters,
    mode: ShotCrawlMode,
) -> Result<Arc<RunTally>> {
    let config = platform.config();
    let frontier = {
        let players = platform.open_players()?;
        Arc::new(populate_frontier(
            &players.primary,
            &filters,
            &config.season.current_season,
            &config.season.skip_players,
        )?)
    };

    let workers = build_workers(config.worker_count(), |_| {
        ShotWorker::new(Arc::clone(platform), mode)
    })?;
    let options = PoolOptions {
        stagger: Duration::from_secs(config.crawler.shot_stagger_secs),
        pause_cap: Duration::from_millis(config.crawler.shot_pause_cap_millis),
    };

    let tally = Arc::new(RunTally::default());
    run_pool(frontier, Arc::clone(&tally), &options, workers);
    tracing::info!("Total new shots added: {}", tally.new_shots());
    Ok(tally)
}

fn reconcile_options(platform: &Platform, scope: TableScope) -> Result<ReconcileOptions> {
    let config = platform.config();
    let mode = if config.run.exact_rows {
        RowDiffMode::Exact
    } else {
        RowDiffMode::KeysOnly
    };

    // Exact-mode rollup comparison is chunked per player to bound memory
    let rollup_player_ids = if scope == TableScope::Shots && mode == RowDiffMode::Exact {
        let players = platform.open_players()?;
        let mut ids: Vec<i64> = players
            .primary
            .player_ids(PLAYER_RELEVANT_TABLE)?
            .into_iter()
            .collect();
        ids.sort_unstable();
        ids
    } else {
        Vec::new()
    };

    Ok(ReconcileOptions {
        mode,
        drop_mismatched: config.run.drop_mismatched,
        known_discrepancies: config.reconcile.known_discrepancies.iter().cloned().collect(),
        incomplete_season_marker: config.incomplete_season_marker().to_string(),
        progress_interval: 1000,
        rollup_player_ids,
    })
}

/// Drops per-season shot tables with zero rows from the primary replica
///
/// An interrupted crawl can leave tables created before their first insert;
/// dropping them lets the next backfill revisit those seasons.
fn sweep_empty_shot_tables(platform: &Platform) -> Result<u64> {
    let shots = platform.open_shots()?;
    let mut dropped = 0;

    let mut tables: Vec<String> = shots
        .primary
        .table_names()?
        .into_iter()
        .filter(|t| TableScope::Shots.includes(t) && t.as_str() != crate::storage::ALL_SHOTS_TABLE)
        .collect();
    tables.sort();

    for table in tables {
        match shots.primary.row_count(&table) {
            Ok(0) => match shots.primary.drop_table(&table) {
                Ok(()) => {
                    tracing::info!("Dropped empty table {}", table);
                    dropped += 1;
                }
                Err(e) => tracing::error!("Failed dropping {}: {}", table, e),
            },
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed counting rows of {}: {}", table, e),
        }
    }

    tracing::info!("Empty-table sweep dropped {}", dropped);
    Ok(dropped)
}
