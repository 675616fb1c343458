//! Replica storage layer
//!
//! Two independently reachable SQLite databases per entity family hold the
//! same logical data. Nothing ties their contents together at write time;
//! convergence is asserted after the fact by the reconciliation engine.

pub mod schema;

mod replica;

pub use replica::{PlayerField, PlayerState, ReplicaStore};
pub use schema::{
    ALL_SHOTS_TABLE, PLAYER_DIRECTORY_TABLE, PLAYER_RELEVANT_TABLE, TEAM_DIRECTORY_TABLE,
};

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to open replica {label} at {path}: {source}")]
    Open {
        label: String,
        path: String,
        source: rusqlite::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

/// The primary and secondary replicas of one entity family
///
/// Reads that feed write decisions go to the primary; writes are applied to
/// both, sequentially (primary first), with no transaction spanning them.
/// A crash between the two leaves the entity replica-divergent, which is a
/// well-defined state the reconciler detects later.
pub struct ReplicaPair {
    pub primary: ReplicaStore,
    pub secondary: ReplicaStore,
}

impl ReplicaPair {
    pub fn new(primary: ReplicaStore, secondary: ReplicaStore) -> Self {
        Self { primary, secondary }
    }

    /// Applies a write to both replicas, tolerating per-statement failures
    ///
    /// A failed statement on either side is logged and skipped; the other
    /// replica is still written. Divergence introduced here surfaces in the
    /// next reconciliation pass.
    pub fn write_both<F>(&self, context: &str, mut write: F)
    where
        F: FnMut(&ReplicaStore) -> StoreResult<()>,
    {
        for store in [&self.primary, &self.secondary] {
            if let Err(e) = write(store) {
                tracing::error!("{} failed on {}: {}", context, store.label(), e);
            }
        }
    }

    /// Applies a schema operation to both replicas, propagating the first error
    ///
    /// Used for DDL: a worker that cannot create its target tables skips the
    /// entity rather than writing half of it.
    pub fn ensure_both<F>(&self, mut ensure: F) -> StoreResult<()>
    where
        F: FnMut(&ReplicaStore) -> StoreResult<()>,
    {
        ensure(&self.primary)?;
        ensure(&self.secondary)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds an in-memory pair for writer tests
    pub(crate) fn memory_pair() -> ReplicaPair {
        ReplicaPair::new(
            ReplicaStore::open_in_memory("primary").unwrap(),
            ReplicaStore::open_in_memory("secondary").unwrap(),
        )
    }

    #[test]
    fn test_write_both_survives_one_side_failing() {
        let pair = memory_pair();
        // Only the secondary has the table; the primary write fails and is
        // tolerated, the secondary write lands.
        pair.secondary.ensure_player_base_tables().unwrap();

        let facts = crate::model::PlayerFacts {
            id: 5,
            last_name: "Solo".to_string(),
            first_name: String::new(),
            first_active_year: "2015-16".to_string(),
            most_recent_active_year: "2020-21".to_string(),
            currently_active: 1,
        };
        pair.write_both("insert player", |store| {
            store.insert_player(schema::PLAYER_DIRECTORY_TABLE, &facts)
        });

        assert!(pair
            .secondary
            .player_ids(schema::PLAYER_DIRECTORY_TABLE)
            .unwrap()
            .contains(&5));
    }
}
