//! Per-player season-activity ingest
//!
//! Each worker pops a player, fetches their profile from the upstream, and
//! merges the active-season vector into the player's detail table on both
//! replicas. The merge is idempotent: a year already known is only touched
//! slot-by-slot, and only in the unknown-to-active direction.

use crate::crawl::pool::{EntityWorker, RunTally};
use crate::model::{label_start_year, PlayerFacts, SeasonActivity, SeasonType};
use crate::platform::Platform;
use crate::storage::ReplicaPair;
use crate::{LedgerError, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Profile result-set locations: `(index, name, season type)`
///
/// The upstream fixes both the array position and the set name; both are
/// checked so a shifted response is rejected instead of misread.
const PROFILE_RESULT_SETS: [(usize, &str, SeasonType); 3] = [
    (0, "SeasonTotalsRegularSeason", SeasonType::Regular),
    (8, "SeasonTotalsPreseason", SeasonType::Preseason),
    (2, "SeasonTotalsPostSeason", SeasonType::Playoffs),
];

/// Counts from one activity merge
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub inserted_years: u64,
    pub slot_updates: u64,
}

impl MergeStats {
    pub fn is_noop(&self) -> bool {
        self.inserted_years == 0 && self.slot_updates == 0
    }
}

/// Worker crawling season activity for one player at a time
pub struct SeasonWorker {
    platform: Arc<Platform>,
    players: ReplicaPair,
}

impl SeasonWorker {
    pub fn new(platform: Arc<Platform>) -> Result<Self> {
        let players = platform.open_players()?;
        Ok(Self { platform, players })
    }
}

impl EntityWorker for SeasonWorker {
    fn process(&mut self, player: &PlayerFacts, _tally: &RunTally) -> Result<()> {
        let url = self.platform.profile_url(player.id);
        let body = self.platform.fetch_with_retry(&url)?;
        let activity = parse_profile_activity(&body, &url)?;

        // No table until the player has been observed active in a retained
        // season; pre-window careers leave no trace.
        let newest = activity.keys().next_back().and_then(|y| label_start_year(y));
        match newest {
            Some(year) if year >= SeasonType::Regular.first_available_year() => {
                let table = player.detail_table_name();
                self.players.ensure_both(|store| store.ensure_activity_table(&table))?;
                let stats = merge_activity(&self.players, &table, &activity)?;
                tracing::info!(
                    "{}: {} years inserted, {} slots updated",
                    table,
                    stats.inserted_years,
                    stats.slot_updates
                );
            }
            _ => {
                tracing::info!(
                    "No retained seasons for {} {} ({})",
                    player.first_name,
                    player.last_name,
                    player.id
                );
            }
        }
        Ok(())
    }
}

/// Parses a profile response into `season label -> activity vector`
///
/// Only years at or above each season type's availability floor are
/// recorded. A malformed body is a permanent, entity-local failure.
pub fn parse_profile_activity(
    body: &str,
    url: &str,
) -> Result<BTreeMap<String, SeasonActivity>> {
    let shape = |message: &str| LedgerError::ResponseShape {
        url: url.to_string(),
        message: message.to_string(),
    };

    let root: Value =
        serde_json::from_str(body).map_err(|e| shape(&format!("not JSON: {}", e)))?;
    let result_sets = root
        .get("resultSets")
        .and_then(Value::as_array)
        .ok_or_else(|| shape("missing resultSets"))?;

    let mut activity: BTreeMap<String, SeasonActivity> = BTreeMap::new();

    for (index, name, season_type) in PROFILE_RESULT_SETS {
        let Some(set) = result_sets.get(index) else {
            continue;
        };
        if set.get("name").and_then(Value::as_str) != Some(name) {
            continue;
        }
        let Some(rows) = set.get("rowSet").and_then(Value::as_array) else {
            continue;
        };

        for row in rows {
            let Some(year) = row.get(1).and_then(Value::as_str) else {
                continue;
            };
            let Some(start_year) = label_start_year(year) else {
                continue;
            };
            if start_year < season_type.first_available_year() {
                continue;
            }
            activity
                .entry(year.to_string())
                .or_default()
                .set_active(season_type);
        }
    }

    Ok(activity)
}

/// Merges freshly-fetched activity into a player's detail table
///
/// Decision per year, against the primary's pre-loaded state:
/// * year absent: insert the full vector on both replicas
/// * year present: targeted slot updates for newly-active season types only
/// * nothing new: no statement executed at all
pub fn merge_activity(
    pair: &ReplicaPair,
    table: &str,
    fresh: &BTreeMap<String, SeasonActivity>,
) -> Result<MergeStats> {
    let known = pair.primary.activity_rows(table)?;
    let mut stats = MergeStats::default();

    for (year, fresh_activity) in fresh {
        match known.get(year) {
            Some(stored) => {
                for season_type in fresh_activity.newly_active(stored) {
                    tracing::info!("Updating {} : {} {} -> 1", table, year, season_type.column());
                    pair.write_both("mark season active", |store| {
                        store.mark_season_active(table, year, season_type)
                    });
                    stats.slot_updates += 1;
                }
            }
            None => {
                tracing::info!("Inserting {} : {}", table, year);
                pair.write_both("insert activity year", |store| {
                    store.insert_activity_row(table, year, fresh_activity)
                });
                stats.inserted_years += 1;
            }
        }
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ACTIVE, UNKNOWN};
    use crate::storage::ReplicaStore;

    fn memory_pair() -> ReplicaPair {
        ReplicaPair::new(
            ReplicaStore::open_in_memory("primary").unwrap(),
            ReplicaStore::open_in_memory("secondary").unwrap(),
        )
    }

    fn profile_body() -> String {
        // Regular seasons 1995-96 (below floor) and 2015-16, playoffs
        // 2015-16, preseason 2003-04 (below the preseason floor)
        let mut result_sets = vec![serde_json::json!({"name": "padding", "rowSet": []}); 9];
        result_sets[0] = serde_json::json!({
            "name": "SeasonTotalsRegularSeason",
            "rowSet": [[0, "1995-96"], [0, "2015-16"]]
        });
        result_sets[2] = serde_json::json!({
            "name": "SeasonTotalsPostSeason",
            "rowSet": [[0, "2015-16"]]
        });
        result_sets[8] = serde_json::json!({
            "name": "SeasonTotalsPreseason",
            "rowSet": [[0, "2003-04"]]
        });
        serde_json::json!({ "resultSets": result_sets }).to_string()
    }

    #[test]
    fn test_parse_profile_honors_availability_floors() {
        let activity = parse_profile_activity(&profile_body(), "test://profile").unwrap();

        assert_eq!(activity.len(), 1);
        let year = &activity["2015-16"];
        assert_eq!(year.reg, ACTIVE);
        assert_eq!(year.playoffs, ACTIVE);
        assert_eq!(year.preseason, UNKNOWN);
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let result = parse_profile_activity("<html>maintenance</html>", "test://profile");
        assert!(matches!(result, Err(LedgerError::ResponseShape { .. })));
    }

    #[test]
    fn test_merge_inserts_then_is_idempotent() {
        let pair = memory_pair();
        let table = "Doe_Jon_1_individual_data";
        pair.ensure_both(|store| store.ensure_activity_table(table)).unwrap();

        let mut fresh = BTreeMap::new();
        fresh.insert("2015-16".to_string(), SeasonActivity::active_in(SeasonType::Regular));
        fresh.insert("2016-17".to_string(), SeasonActivity::active_in(SeasonType::Playoffs));

        let first = merge_activity(&pair, table, &fresh).unwrap();
        assert_eq!(first.inserted_years, 2);
        assert_eq!(first.slot_updates, 0);

        // Identical facts the second time: a pure no-op
        let second = merge_activity(&pair, table, &fresh).unwrap();
        assert!(second.is_noop());
    }

    #[test]
    fn test_merge_updates_only_newly_active_slots() {
        let pair = memory_pair();
        let table = "Doe_Jon_2_individual_data";
        pair.ensure_both(|store| store.ensure_activity_table(table)).unwrap();

        let mut fresh = BTreeMap::new();
        fresh.insert("2015-16".to_string(), SeasonActivity::active_in(SeasonType::Regular));
        merge_activity(&pair, table, &fresh).unwrap();

        // The same year resurfaces with playoffs now also active
        let mut fresh2 = BTreeMap::new();
        let mut both = SeasonActivity::active_in(SeasonType::Regular);
        both.set_active(SeasonType::Playoffs);
        fresh2.insert("2015-16".to_string(), both);

        let stats = merge_activity(&pair, table, &fresh2).unwrap();
        assert_eq!(stats.inserted_years, 0);
        assert_eq!(stats.slot_updates, 1);

        for store in [&pair.primary, &pair.secondary] {
            let rows = store.activity_rows(table).unwrap();
            assert_eq!(rows["2015-16"].reg, ACTIVE);
            assert_eq!(rows["2015-16"].playoffs, ACTIVE);
            assert_eq!(rows["2015-16"].preseason, UNKNOWN);
        }
    }
}
