//! Reconciliation result types

use std::collections::{BTreeSet, HashSet};

/// Both one-way differences between two string sets
///
/// `only_in_primary` and `only_in_secondary` are disjoint by construction
/// and their union is the symmetric difference of the inputs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SetDiff {
    pub only_in_primary: BTreeSet<String>,
    pub only_in_secondary: BTreeSet<String>,
}

impl SetDiff {
    pub fn is_empty(&self) -> bool {
        self.only_in_primary.is_empty() && self.only_in_secondary.is_empty()
    }

    pub fn total(&self) -> usize {
        self.only_in_primary.len() + self.only_in_secondary.len()
    }
}

/// Computes both one-way set differences
pub fn set_diff(primary: &HashSet<String>, secondary: &HashSet<String>) -> SetDiff {
    SetDiff {
        only_in_primary: primary.difference(secondary).cloned().collect(),
        only_in_secondary: secondary.difference(primary).cloned().collect(),
    }
}

/// A table whose row sets genuinely diverge between the replicas
#[derive(Debug, Clone)]
pub struct TableVerdict {
    pub table: String,
    pub diff: SetDiff,
}

/// Everything one reconciliation pass found
#[derive(Debug, Default)]
pub struct MismatchReport {
    /// Tables present in one replica and absent in the other
    pub table_inventory: SetDiff,

    /// Tables with true row-level divergence
    pub mismatched_tables: Vec<TableVerdict>,

    /// Tables whose only difference fell under the incomplete-season rule
    pub waived_tables: Vec<String>,

    /// Tables on the accepted-discrepancy list that did differ
    pub excluded_tables: Vec<String>,

    /// Tables whose rows could not be read on one side
    pub skipped_tables: Vec<String>,

    /// Tables removed from the primary by the corrective action
    pub dropped_tables: Vec<String>,

    /// How many common tables were row-compared
    pub tables_compared: usize,
}

impl MismatchReport {
    /// True when nothing outside the accepted exclusions diverged
    pub fn is_clean(&self) -> bool {
        self.table_inventory.is_empty()
            && self.mismatched_tables.is_empty()
            && self.skipped_tables.is_empty()
    }

    /// Writes the report to the log, stating empty results explicitly
    pub fn log(&self, scope_name: &str) {
        if self.table_inventory.is_empty() {
            tracing::info!("{}: table inventory differences: none", scope_name);
        } else {
            tracing::info!(
                "{}: tables only in primary ({}): {:?}",
                scope_name,
                self.table_inventory.only_in_primary.len(),
                self.table_inventory.only_in_primary
            );
            tracing::info!(
                "{}: tables only in secondary ({}): {:?}",
                scope_name,
                self.table_inventory.only_in_secondary.len(),
                self.table_inventory.only_in_secondary
            );
        }

        if self.mismatched_tables.is_empty() {
            tracing::info!("{}: mismatched tables: none", scope_name);
        } else {
            for verdict in &self.mismatched_tables {
                tracing::info!(
                    "{}: MISMATCHED TABLE {} ({} rows only in primary, {} only in secondary)",
                    scope_name,
                    verdict.table,
                    verdict.diff.only_in_primary.len(),
                    verdict.diff.only_in_secondary.len()
                );
            }
        }

        for table in &self.waived_tables {
            tracing::info!(
                "{}: {} waived under the incomplete-season exception",
                scope_name,
                table
            );
        }
        for table in &self.excluded_tables {
            tracing::info!("{}: {} differs but is an accepted discrepancy", scope_name, table);
        }
        for table in &self.skipped_tables {
            tracing::warn!("{}: {} skipped (read failure)", scope_name, table);
        }
        for table in &self.dropped_tables {
            tracing::info!("{}: dropped {} from the primary replica", scope_name, table);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_diff_directions_are_disjoint_and_complete() {
        let a = to_set(&["1", "2", "3"]);
        let b = to_set(&["3", "4"]);

        let diff = set_diff(&a, &b);
        assert_eq!(diff.only_in_primary, to_set(&["1", "2"]).into_iter().collect());
        assert_eq!(diff.only_in_secondary, to_set(&["4"]).into_iter().collect());

        // Disjoint, and the union is the symmetric difference
        assert!(diff.only_in_primary.is_disjoint(&diff.only_in_secondary));
        let union: BTreeSet<String> = diff
            .only_in_primary
            .union(&diff.only_in_secondary)
            .cloned()
            .collect();
        let symmetric: BTreeSet<String> = a.symmetric_difference(&b).cloned().collect();
        assert_eq!(union, symmetric);
    }

    #[test]
    fn test_equal_sets_report_none() {
        let a = to_set(&["x", "y"]);
        let diff = set_diff(&a, &a.clone());
        assert!(diff.is_empty());
        assert_eq!(diff.total(), 0);
    }
}
