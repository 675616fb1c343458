//! Builds the crawl frontier from a replica snapshot
//!
//! One filtered scan of the primary player replica produces the complete
//! descriptor set for a run. Population is all-or-nothing: a scan failure
//! publishes no frontier at all.

use crate::crawl::frontier::Frontier;
use crate::storage::{ReplicaStore, PLAYER_RELEVANT_TABLE};
use crate::Result;
use std::collections::HashSet;

/// Filter predicates recognized by the distributor
#[derive(Debug, Clone, Default)]
pub struct FrontierFilters {
    /// Restrict to players currently flagged active
    pub only_active: bool,

    /// Restrict to players whose most recent activity is the current season
    pub only_current: bool,

    /// Skip players whose per-player detail table already exists, so a
    /// long-running first-time backfill can resume where it stopped
    pub skip_existing_detail_tables: bool,
}

impl FrontierFilters {
    /// Filters for a first-time, resumable backfill
    pub fn backfill() -> Self {
        Self {
            only_active: false,
            only_current: false,
            skip_existing_detail_tables: true,
        }
    }

    /// Filters for an incremental current-season update
    pub fn current_season() -> Self {
        Self {
            only_active: true,
            only_current: true,
            skip_existing_detail_tables: false,
        }
    }

    /// Filters for a full scan with no skipping
    pub fn everyone() -> Self {
        Self::default()
    }
}

/// Snapshots the filtered player set into a fresh frontier
///
/// Descriptors carry enough denormalized data (names, id, activity years)
/// that workers never join back to the directory. `skip_players` removes ids
/// the upstream is known to have no data for.
///
/// # Returns
///
/// * `Ok(Frontier)` - The complete filtered set, published atomically
/// * `Err(LedgerError)` - The scan failed; nothing was published
pub fn populate_frontier(
    store: &ReplicaStore,
    filters: &FrontierFilters,
    current_season: &str,
    skip_players: &[i64],
) -> Result<Frontier> {
    let only_current = filters.only_current.then_some(current_season);
    let mut players = store.scan_players(PLAYER_RELEVANT_TABLE, filters.only_active, only_current)?;

    if !skip_players.is_empty() {
        let skip: HashSet<i64> = skip_players.iter().copied().collect();
        players.retain(|p| !skip.contains(&p.id));
    }

    if filters.skip_existing_detail_tables {
        let existing = store.table_names()?;
        players.retain(|p| !existing.contains(&p.detail_table_name()));
    }

    tracing::info!("Frontier populated with {} players", players.len());
    Ok(Frontier::new(players))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{season_label, PlayerFacts};

    fn seeded_store() -> ReplicaStore {
        let store = ReplicaStore::open_in_memory("test").unwrap();
        store.ensure_player_base_tables().unwrap();

        // Four players spanning the activity/current-season truth table
        for (id, active, recent) in [(1, 0, 2019), (2, 1, 2019), (3, 0, 2021), (4, 1, 2021)] {
            store
                .insert_player(
                    PLAYER_RELEVANT_TABLE,
                    &PlayerFacts {
                        id,
                        last_name: format!("Last{}", id),
                        first_name: format!("First{}", id),
                        first_active_year: season_label(2015),
                        most_recent_active_year: season_label(recent),
                        currently_active: active,
                    },
                )
                .unwrap();
        }
        store
    }

    fn ids(frontier: &Frontier) -> Vec<i64> {
        let mut ids = Vec::new();
        while let Some(p) = frontier.pop() {
            ids.push(p.id);
        }
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_filter_truth_table() {
        let store = seeded_store();
        let season = "2021-22";

        let all = populate_frontier(&store, &FrontierFilters::everyone(), season, &[]).unwrap();
        assert_eq!(ids(&all), vec![1, 2, 3, 4]);

        let active = populate_frontier(
            &store,
            &FrontierFilters {
                only_active: true,
                ..Default::default()
            },
            season,
            &[],
        )
        .unwrap();
        assert_eq!(ids(&active), vec![2, 4]);

        let current = populate_frontier(
            &store,
            &FrontierFilters {
                only_current: true,
                ..Default::default()
            },
            season,
            &[],
        )
        .unwrap();
        assert_eq!(ids(&current), vec![3, 4]);

        let both = populate_frontier(&store, &FrontierFilters::current_season(), season, &[]).unwrap();
        assert_eq!(ids(&both), vec![4]);
    }

    #[test]
    fn test_skip_players_removes_ids() {
        let store = seeded_store();
        let frontier =
            populate_frontier(&store, &FrontierFilters::everyone(), "2021-22", &[2, 3]).unwrap();
        assert_eq!(ids(&frontier), vec![1, 4]);
    }

    #[test]
    fn test_skip_existing_detail_tables() {
        let store = seeded_store();
        // Player 1 already has a detail table from an interrupted backfill
        store
            .ensure_activity_table("Last1_First1_1_individual_data")
            .unwrap();

        let frontier =
            populate_frontier(&store, &FrontierFilters::backfill(), "2021-22", &[]).unwrap();
        assert_eq!(ids(&frontier), vec![2, 3, 4]);
    }
}
