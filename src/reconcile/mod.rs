//! Reconciliation engine
//!
//! Compares the two replicas of one entity family at table and row
//! granularity, after the worker pool has fully joined. The engine runs
//! single-threaded and only ever reads, except for the explicit opt-in
//! corrective action: dropping a mismatched table from the primary replica
//! so the next crawl refills it.

mod report;

pub use report::{set_diff, MismatchReport, SetDiff, TableVerdict};

use crate::storage::{ReplicaPair, StoreError, ALL_SHOTS_TABLE, PLAYER_DIRECTORY_TABLE, PLAYER_RELEVANT_TABLE, TEAM_DIRECTORY_TABLE};
use std::collections::{BTreeSet, HashSet};

/// Row diff granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDiffMode {
    /// Compare only the unique-key column's value set (the default; trades
    /// precision for speed on very large tables)
    KeysOnly,
    /// Concatenate every column of every row and compare the row strings
    Exact,
}

/// Which family of tables a pass covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableScope {
    Players,
    Shots,
}

impl TableScope {
    pub fn name(&self) -> &'static str {
        match self {
            TableScope::Players => "players",
            TableScope::Shots => "shots",
        }
    }

    /// Whether a table name belongs to this scope
    pub fn includes(&self, table: &str) -> bool {
        match self {
            TableScope::Players => {
                table == PLAYER_DIRECTORY_TABLE
                    || table == PLAYER_RELEVANT_TABLE
                    || table == TEAM_DIRECTORY_TABLE
                    || table.ends_with("_individual_data")
            }
            TableScope::Shots => {
                table == ALL_SHOTS_TABLE
                    || table.ends_with("_RegularSeason")
                    || table.ends_with("_Preseason")
                    || table.ends_with("_Playoffs")
            }
        }
    }

    /// The unique-key column compared in keys-only mode
    pub fn key_column(&self, table: &str) -> &'static str {
        match self {
            TableScope::Players if table.ends_with("_individual_data") => "year",
            TableScope::Players => "id",
            TableScope::Shots => "shot_key",
        }
    }

    /// Whether the corrective action may drop this table
    ///
    /// Only per-player tables are droppable: a crawl stage rebuilds them from
    /// scratch. The directory roots and the rollup are not refilled row-by-row
    /// after a drop, so they are reported but never dropped.
    pub fn droppable(&self, table: &str) -> bool {
        match self {
            TableScope::Players => table.ends_with("_individual_data"),
            TableScope::Shots => table != ALL_SHOTS_TABLE,
        }
    }
}

/// Reconciliation pass configuration
#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    pub mode: RowDiffMode,

    /// Drop mismatched tables from the primary replica (destructive opt-in)
    pub drop_mismatched: bool,

    /// Tables with accepted historical discrepancies; they contribute to the
    /// inventory but never to the mismatch signal
    pub known_discrepancies: HashSet<String>,

    /// Marker content for the single-row incomplete-season exception
    pub incomplete_season_marker: String,

    /// Log a running counter every this many tables
    pub progress_interval: usize,

    /// Player ids used to chunk the rollup table in exact mode; empty means
    /// the rollup is compared keys-only regardless of mode
    pub rollup_player_ids: Vec<i64>,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            mode: RowDiffMode::KeysOnly,
            drop_mismatched: false,
            known_discrepancies: HashSet::new(),
            incomplete_season_marker: String::new(),
            progress_interval: 1000,
            rollup_player_ids: Vec::new(),
        }
    }
}

/// Diffs the two replicas of one entity family
///
/// # Returns
///
/// * `Ok(MismatchReport)` - What diverged; empty sections reported explicitly
/// * `Err(StoreError)` - Listing the table inventory itself failed
pub fn reconcile(
    pair: &ReplicaPair,
    scope: TableScope,
    options: &ReconcileOptions,
) -> Result<MismatchReport, StoreError> {
    let primary_tables: HashSet<String> = pair
        .primary
        .table_names()?
        .into_iter()
        .filter(|t| scope.includes(t))
        .collect();
    let secondary_tables: HashSet<String> = pair
        .secondary
        .table_names()?
        .into_iter()
        .filter(|t| scope.includes(t))
        .collect();

    tracing::info!(
        "{}: primary table count {}, secondary table count {}",
        scope.name(),
        primary_tables.len(),
        secondary_tables.len()
    );

    let mut report = MismatchReport {
        table_inventory: set_diff(&primary_tables, &secondary_tables),
        ..Default::default()
    };

    let mut common: Vec<&String> = primary_tables.intersection(&secondary_tables).collect();
    common.sort();

    for table in common {
        if table.as_str() == ALL_SHOTS_TABLE {
            // The rollup is huge and shared; it gets its own treatment below
            continue;
        }
        compare_table(pair, scope, options, table, &mut report);

        report.tables_compared += 1;
        if report.tables_compared % options.progress_interval == 0 {
            tracing::info!("{}: {} tables compared", scope.name(), report.tables_compared);
        }
    }

    if scope == TableScope::Shots
        && primary_tables.contains(ALL_SHOTS_TABLE)
        && secondary_tables.contains(ALL_SHOTS_TABLE)
    {
        compare_rollup(pair, options, &mut report);
        report.tables_compared += 1;
    }

    report.log(scope.name());
    Ok(report)
}

/// Row-compares one table present in both replicas
fn compare_table(
    pair: &ReplicaPair,
    scope: TableScope,
    options: &ReconcileOptions,
    table: &str,
    report: &mut MismatchReport,
) {
    let rows = match options.mode {
        RowDiffMode::Exact => (
            pair.primary.row_signatures(table, None),
            pair.secondary.row_signatures(table, None),
        ),
        RowDiffMode::KeysOnly => {
            let key = scope.key_column(table);
            (
                pair.primary.key_values(table, key),
                pair.secondary.key_values(table, key),
            )
        }
    };

    // A read failure on one table never aborts the pass
    let (primary_rows, secondary_rows) = match rows {
        (Ok(p), Ok(s)) => (p, s),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!("{}: read failure, skipping: {}", table, e);
            report.skipped_tables.push(table.to_string());
            return;
        }
    };

    let diff = set_diff(&primary_rows, &secondary_rows);
    if diff.is_empty() {
        return;
    }

    if options.known_discrepancies.contains(table) {
        report.excluded_tables.push(table.to_string());
        return;
    }

    if single_row_incomplete_season_exception(&diff, &options.incomplete_season_marker) {
        report.waived_tables.push(table.to_string());
        return;
    }

    if options.drop_mismatched && scope.droppable(table) {
        match pair.primary.drop_table(table) {
            Ok(()) => report.dropped_tables.push(table.to_string()),
            Err(e) => tracing::error!("Failed dropping {} from primary: {}", table, e),
        }
    }
    report.mismatched_tables.push(TableVerdict {
        table: table.to_string(),
        diff,
    });
}

/// Compares the `all_shots` rollup
///
/// Keys-only by default; in exact mode the comparison is chunked per player
/// id to bound memory. The rollup is reported but never dropped.
fn compare_rollup(pair: &ReplicaPair, options: &ReconcileOptions, report: &mut MismatchReport) {
    if options.mode == RowDiffMode::Exact && !options.rollup_player_ids.is_empty() {
        let mut combined = SetDiff::default();
        for (count, player_id) in options.rollup_player_ids.iter().enumerate() {
            let rows = (
                pair.primary.row_signatures(ALL_SHOTS_TABLE, Some(*player_id)),
                pair.secondary.row_signatures(ALL_SHOTS_TABLE, Some(*player_id)),
            );
            let (primary_rows, secondary_rows) = match rows {
                (Ok(p), Ok(s)) => (p, s),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!("all_shots: read failure for player {}: {}", player_id, e);
                    continue;
                }
            };
            let diff = set_diff(&primary_rows, &secondary_rows);
            combined.only_in_primary.extend(diff.only_in_primary);
            combined.only_in_secondary.extend(diff.only_in_secondary);

            if (count + 1) % options.progress_interval == 0 {
                tracing::info!("all_shots: {} players compared", count + 1);
            }
        }
        record_rollup_diff(combined, report);
        return;
    }

    let rows = (
        pair.primary.key_values(ALL_SHOTS_TABLE, "shot_key"),
        pair.secondary.key_values(ALL_SHOTS_TABLE, "shot_key"),
    );
    match rows {
        (Ok(p), Ok(s)) => record_rollup_diff(set_diff(&p, &s), report),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!("all_shots: read failure, skipping: {}", e);
            report.skipped_tables.push(ALL_SHOTS_TABLE.to_string());
        }
    }
}

fn record_rollup_diff(diff: SetDiff, report: &mut MismatchReport) {
    if diff.is_empty() {
        return;
    }
    report.mismatched_tables.push(TableVerdict {
        table: ALL_SHOTS_TABLE.to_string(),
        diff,
    });
}

/// The named exception for in-progress seasons
///
/// A table whose whole diff is one row on each side, where both rows contain
/// the incomplete-season marker, reflects the systematic upstream gap around
/// a season still being played, not a real divergence, and is treated as
/// matched. Any other single-row difference, or any larger one, is a true
/// mismatch.
pub fn single_row_incomplete_season_exception(diff: &SetDiff, marker: &str) -> bool {
    !marker.is_empty()
        && diff.only_in_primary.len() == 1
        && diff.only_in_secondary.len() == 1
        && row_contains(&diff.only_in_primary, marker)
        && row_contains(&diff.only_in_secondary, marker)
}

fn row_contains(rows: &BTreeSet<String>, marker: &str) -> bool {
    rows.iter().all(|row| row.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PlayerFacts, SeasonActivity, ACTIVE, UNKNOWN};
    use crate::storage::{ReplicaStore, PLAYER_RELEVANT_TABLE};

    fn memory_pair() -> ReplicaPair {
        ReplicaPair::new(
            ReplicaStore::open_in_memory("primary").unwrap(),
            ReplicaStore::open_in_memory("secondary").unwrap(),
        )
    }

    fn player(id: i64) -> PlayerFacts {
        PlayerFacts {
            id,
            last_name: format!("Last{}", id),
            first_name: format!("First{}", id),
            first_active_year: "2015-16".to_string(),
            most_recent_active_year: "2021-22".to_string(),
            currently_active: 1,
        }
    }

    #[test]
    fn test_scope_membership() {
        let players = TableScope::Players;
        assert!(players.includes("player_directory"));
        assert!(players.includes("Doe_Jon_1_individual_data"));
        assert!(!players.includes("Doe_Jon_1_2015_16_Playoffs"));

        let shots = TableScope::Shots;
        assert!(shots.includes("all_shots"));
        assert!(shots.includes("Doe_Jon_1_2015_16_Playoffs"));
        assert!(!shots.includes("player_directory"));
    }

    #[test]
    fn test_identical_replicas_are_clean() {
        let pair = memory_pair();
        for store in [&pair.primary, &pair.secondary] {
            store.ensure_player_base_tables().unwrap();
            store.insert_player(PLAYER_RELEVANT_TABLE, &player(1)).unwrap();
        }

        let report =
            reconcile(&pair, TableScope::Players, &ReconcileOptions::default()).unwrap();
        assert!(report.is_clean());
        assert!(report.mismatched_tables.is_empty());
    }

    #[test]
    fn test_inventory_diff_lists_both_directions() {
        let pair = memory_pair();
        pair.primary.ensure_player_base_tables().unwrap();
        pair.secondary.ensure_player_base_tables().unwrap();
        pair.primary.ensure_activity_table("A_A_1_individual_data").unwrap();
        pair.secondary.ensure_activity_table("B_B_2_individual_data").unwrap();

        let report =
            reconcile(&pair, TableScope::Players, &ReconcileOptions::default()).unwrap();

        assert!(report
            .table_inventory
            .only_in_primary
            .contains("A_A_1_individual_data"));
        assert!(report
            .table_inventory
            .only_in_secondary
            .contains("B_B_2_individual_data"));
    }

    #[test]
    fn test_row_divergence_is_flagged() {
        let pair = memory_pair();
        for store in [&pair.primary, &pair.secondary] {
            store.ensure_player_base_tables().unwrap();
        }
        pair.primary.insert_player(PLAYER_RELEVANT_TABLE, &player(1)).unwrap();
        pair.primary.insert_player(PLAYER_RELEVANT_TABLE, &player(2)).unwrap();
        pair.secondary.insert_player(PLAYER_RELEVANT_TABLE, &player(2)).unwrap();
        pair.secondary.insert_player(PLAYER_RELEVANT_TABLE, &player(3)).unwrap();

        let report =
            reconcile(&pair, TableScope::Players, &ReconcileOptions::default()).unwrap();

        let verdict = report
            .mismatched_tables
            .iter()
            .find(|v| v.table == PLAYER_RELEVANT_TABLE)
            .unwrap();
        assert!(verdict.diff.only_in_primary.contains("1"));
        assert!(verdict.diff.only_in_secondary.contains("3"));
        assert!(verdict
            .diff
            .only_in_primary
            .is_disjoint(&verdict.diff.only_in_secondary));
    }

    #[test]
    fn test_known_discrepancy_contributes_no_mismatch_signal() {
        let pair = memory_pair();
        let table = "Doe_Jon_1_individual_data";
        for store in [&pair.primary, &pair.secondary] {
            store.ensure_player_base_tables().unwrap();
            store.ensure_activity_table(table).unwrap();
        }
        pair.primary
            .insert_activity_row(table, "2015-16", &SeasonActivity::default())
            .unwrap();

        let options = ReconcileOptions {
            known_discrepancies: HashSet::from([table.to_string()]),
            ..Default::default()
        };
        let report = reconcile(&pair, TableScope::Players, &options).unwrap();

        assert!(report.mismatched_tables.is_empty());
        assert_eq!(report.excluded_tables, vec![table.to_string()]);
    }

    #[test]
    fn test_single_row_incomplete_season_exception_waives() {
        let pair = memory_pair();
        let table = "Doe_Jon_1_individual_data";
        for store in [&pair.primary, &pair.secondary] {
            store.ensure_player_base_tables().unwrap();
            store.ensure_activity_table(table).unwrap();
        }
        // Same season, one side has seen the playoffs slot flip already
        pair.primary
            .insert_activity_row(
                table,
                "2021-22",
                &SeasonActivity {
                    reg: ACTIVE,
                    preseason: UNKNOWN,
                    playoffs: UNKNOWN,
                },
            )
            .unwrap();
        pair.secondary
            .insert_activity_row(
                table,
                "2021-22",
                &SeasonActivity {
                    reg: ACTIVE,
                    preseason: ACTIVE,
                    playoffs: UNKNOWN,
                },
            )
            .unwrap();

        let options = ReconcileOptions {
            mode: RowDiffMode::Exact,
            incomplete_season_marker: "2021-22".to_string(),
            ..Default::default()
        };
        let report = reconcile(&pair, TableScope::Players, &options).unwrap();

        assert!(report.mismatched_tables.is_empty());
        assert_eq!(report.waived_tables, vec![table.to_string()]);
    }

    #[test]
    fn test_other_single_row_difference_is_a_true_mismatch() {
        let diff = SetDiff {
            only_in_primary: BTreeSet::from(["2014-15_1_-1_-1".to_string()]),
            only_in_secondary: BTreeSet::from(["2014-15_1_1_-1".to_string()]),
        };
        assert!(!single_row_incomplete_season_exception(&diff, "2021-22"));
    }

    #[test]
    fn test_directory_tables_are_reported_but_never_dropped() {
        let pair = memory_pair();
        for store in [&pair.primary, &pair.secondary] {
            store.ensure_player_base_tables().unwrap();
        }
        // Divergent directory row and a divergent detail table
        pair.primary.insert_player(PLAYER_RELEVANT_TABLE, &player(1)).unwrap();
        let detail = "Last1_First1_1_individual_data";
        for store in [&pair.primary, &pair.secondary] {
            store.ensure_activity_table(detail).unwrap();
        }
        pair.primary
            .insert_activity_row(detail, "2015-16", &SeasonActivity::default())
            .unwrap();

        let options = ReconcileOptions {
            drop_mismatched: true,
            ..Default::default()
        };
        let report = reconcile(&pair, TableScope::Players, &options).unwrap();

        // The rebuildable detail table is dropped; the directory root is
        // flagged mismatched but survives
        assert_eq!(report.dropped_tables, vec![detail.to_string()]);
        assert!(pair.primary.table_names().unwrap().contains(PLAYER_RELEVANT_TABLE));
        assert!(report
            .mismatched_tables
            .iter()
            .any(|v| v.table == PLAYER_RELEVANT_TABLE));
    }

    #[test]
    fn test_corrective_drop_removes_table_from_primary_only() {
        let pair = memory_pair();
        let table = "Doe_Jon_1_2015_16_Playoffs";
        for store in [&pair.primary, &pair.secondary] {
            store.ensure_shot_table(table).unwrap();
        }
        // Force a key divergence
        let shot = crate::crawl::shots::decode_shot_row(
            &serde_json::json!([
                "Shot Chart Detail", 1, 1, 1, "n", 5, "t", 1, 1, 1, "Made", "p", "s",
                "zb", "za", "zr", 1, 1, 1, 0, 0, "20151203", "LAL", "OKC"
            ]),
            &player(1),
            "2015-16",
            crate::model::SeasonType::Playoffs,
            &std::collections::HashMap::new(),
        )
        .unwrap();
        pair.primary.insert_shot(table, &shot).unwrap();

        let options = ReconcileOptions {
            drop_mismatched: true,
            ..Default::default()
        };
        let report = reconcile(&pair, TableScope::Shots, &options).unwrap();

        assert_eq!(report.dropped_tables, vec![table.to_string()]);
        assert!(!pair.primary.table_names().unwrap().contains(table));
        assert!(pair.secondary.table_names().unwrap().contains(table));
    }
}
