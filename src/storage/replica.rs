//! One replica connection and the operations the pipeline needs from it
//!
//! A [`ReplicaStore`] wraps a single rusqlite connection to one replica
//! database. Connections are cheap and never shared across threads; every
//! worker opens its own pair.

use crate::model::{PlayerFacts, SeasonActivity, SeasonType, ShotRecord, TeamFacts};
use crate::storage::schema::{
    create_activity_table_sql, create_all_shots_index_sql, create_player_table_sql,
    create_shot_table_sql, create_team_table_sql, ALL_SHOTS_TABLE, PLAYER_DIRECTORY_TABLE,
    PLAYER_RELEVANT_TABLE, SHOT_COLUMNS,
};
use crate::storage::StoreError;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, Row};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// The mutable directory fields a targeted update may touch
#[derive(Debug, Clone)]
pub enum PlayerField {
    CurrentlyActive(i64),
    MostRecentActiveYear(String),
}

/// Mutable per-player state already present in a directory table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerState {
    pub currently_active: i64,
    pub most_recent_active_year: String,
}

/// A connection to one replica database
pub struct ReplicaStore {
    conn: Connection,
    label: String,
}

impl ReplicaStore {
    /// Opens (creating if necessary) the replica database at `path`
    pub fn open(path: impl AsRef<Path>, label: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).map_err(|source| StoreError::Open {
            label: label.to_string(),
            path: path.as_ref().display().to_string(),
            source,
        })?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA temp_store = MEMORY;",
        )?;

        Ok(Self {
            conn,
            label: label.to_string(),
        })
    }

    /// Creates an in-memory replica (used by tests and never by the pipeline)
    pub fn open_in_memory(label: &str) -> Result<Self, StoreError> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            label: label.to_string(),
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    // ===== Table management =====

    /// Ensures the three base player tables exist
    pub fn ensure_player_base_tables(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(&format!(
                "{};\n{};\n{};",
                create_player_table_sql(PLAYER_DIRECTORY_TABLE),
                create_player_table_sql(PLAYER_RELEVANT_TABLE),
                create_team_table_sql()
            ))
            .map_err(Into::into)
    }

    /// Ensures the shot rollup table and its player index exist
    pub fn ensure_all_shots_table(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(&format!(
            "{};\n{};",
            create_shot_table_sql(ALL_SHOTS_TABLE),
            create_all_shots_index_sql()
        ))?;
        Ok(())
    }

    pub fn ensure_activity_table(&self, table: &str) -> Result<(), StoreError> {
        self.conn.execute(&create_activity_table_sql(table), [])?;
        Ok(())
    }

    pub fn ensure_shot_table(&self, table: &str) -> Result<(), StoreError> {
        self.conn.execute(&create_shot_table_sql(table), [])?;
        Ok(())
    }

    /// Lists every user table in the replica
    pub fn table_names(&self) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(names)
    }

    pub fn drop_table(&self, table: &str) -> Result<(), StoreError> {
        self.conn
            .execute(&format!("DROP TABLE \"{}\"", table), [])?;
        Ok(())
    }

    pub fn row_count(&self, table: &str) -> Result<u64, StoreError> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT count(*) FROM \"{}\"", table), [], |row| {
                    row.get(0)
                })?;
        Ok(count as u64)
    }

    // ===== Player directory =====

    /// Ids already present in a directory table
    pub fn player_ids(&self, table: &str) -> Result<HashSet<i64>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT id FROM \"{}\"", table))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, i64>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(ids)
    }

    /// Mutable state of every player in a directory table, keyed by id
    pub fn player_states(&self, table: &str) -> Result<HashMap<i64, PlayerState>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT id, currently_active, most_recent_active_year FROM \"{}\"",
            table
        ))?;
        let states = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    PlayerState {
                        currently_active: row.get::<_, Option<i64>>(1)?.unwrap_or(0),
                        most_recent_active_year: row
                            .get::<_, Option<String>>(2)?
                            .unwrap_or_default(),
                    },
                ))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(states)
    }

    pub fn insert_player(&self, table: &str, facts: &PlayerFacts) -> Result<(), StoreError> {
        self.conn.execute(
            &format!(
                "INSERT INTO \"{}\" (id, last_name, first_name, first_active_year, \
                 most_recent_active_year, currently_active) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                table
            ),
            params![
                facts.id,
                facts.last_name,
                facts.first_name,
                facts.first_active_year,
                facts.most_recent_active_year,
                facts.currently_active
            ],
        )?;
        Ok(())
    }

    /// Applies a targeted update to exactly one directory field
    pub fn update_player_field(
        &self,
        table: &str,
        id: i64,
        field: &PlayerField,
    ) -> Result<(), StoreError> {
        match field {
            PlayerField::CurrentlyActive(value) => self.conn.execute(
                &format!("UPDATE \"{}\" SET currently_active = ?1 WHERE id = ?2", table),
                params![value, id],
            )?,
            PlayerField::MostRecentActiveYear(value) => self.conn.execute(
                &format!(
                    "UPDATE \"{}\" SET most_recent_active_year = ?1 WHERE id = ?2",
                    table
                ),
                params![value, id],
            )?,
        };
        Ok(())
    }

    /// Scans a directory table with the distributor's filter predicates
    ///
    /// `only_current` carries the current season label when set; `only_active`
    /// restricts to players flagged active. Both unset scans the whole table.
    pub fn scan_players(
        &self,
        table: &str,
        only_active: bool,
        only_current: Option<&str>,
    ) -> Result<Vec<PlayerFacts>, StoreError> {
        let base = format!(
            "SELECT id, last_name, first_name, first_active_year, \
             most_recent_active_year, currently_active FROM \"{}\"",
            table
        );

        let mut rows = Vec::new();
        match (only_active, only_current) {
            (false, None) => {
                let mut stmt = self.conn.prepare(&base)?;
                let mapped = stmt.query_map([], row_to_player)?;
                for facts in mapped {
                    rows.push(facts?);
                }
            }
            (true, None) => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("{} WHERE currently_active = 1", base))?;
                let mapped = stmt.query_map([], row_to_player)?;
                for facts in mapped {
                    rows.push(facts?);
                }
            }
            (false, Some(season)) => {
                let mut stmt = self
                    .conn
                    .prepare(&format!("{} WHERE most_recent_active_year = ?1", base))?;
                let mapped = stmt.query_map(params![season], row_to_player)?;
                for facts in mapped {
                    rows.push(facts?);
                }
            }
            (true, Some(season)) => {
                let mut stmt = self.conn.prepare(&format!(
                    "{} WHERE currently_active = 1 AND most_recent_active_year = ?1",
                    base
                ))?;
                let mapped = stmt.query_map(params![season], row_to_player)?;
                for facts in mapped {
                    rows.push(facts?);
                }
            }
        }
        Ok(rows)
    }

    // ===== Teams =====

    pub fn team_ids(&self) -> Result<HashSet<i64>, StoreError> {
        self.player_ids(super::schema::TEAM_DIRECTORY_TABLE)
    }

    pub fn insert_team(&self, team: &TeamFacts) -> Result<(), StoreError> {
        self.conn.execute(
            &format!(
                "INSERT INTO \"{}\" (id, abbr, casual_name, first_name, second_name) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                super::schema::TEAM_DIRECTORY_TABLE
            ),
            params![
                team.id,
                team.abbr,
                team.casual_name,
                team.first_name,
                team.second_name
            ],
        )?;
        Ok(())
    }

    /// Abbreviation-to-id map for resolving shot team columns
    pub fn team_abbr_map(&self) -> Result<HashMap<String, i64>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT abbr, id FROM \"{}\"",
            super::schema::TEAM_DIRECTORY_TABLE
        ))?;
        let map = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(map)
    }

    // ===== Season activity =====

    /// All activity rows of one per-player table, keyed by season label
    pub fn activity_rows(&self, table: &str) -> Result<HashMap<String, SeasonActivity>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT year, reg, preseason, playoffs FROM \"{}\"",
            table
        ))?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    SeasonActivity {
                        reg: row.get(1)?,
                        preseason: row.get(2)?,
                        playoffs: row.get(3)?,
                    },
                ))
            })?
            .collect::<Result<HashMap<_, _>, _>>()?;
        Ok(rows)
    }

    /// Activity rows restricted to one season and season type being active
    pub fn activity_for_season(
        &self,
        table: &str,
        season: &str,
        season_type: SeasonType,
    ) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT year FROM \"{}\" WHERE year = ?1 AND {} = 1",
            table,
            season_type.column()
        ))?;
        let years = stmt
            .query_map(params![season], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(years)
    }

    pub fn insert_activity_row(
        &self,
        table: &str,
        year: &str,
        activity: &SeasonActivity,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            &format!(
                "INSERT INTO \"{}\" (year, reg, preseason, playoffs) VALUES (?1, ?2, ?3, ?4)",
                table
            ),
            params![year, activity.reg, activity.preseason, activity.playoffs],
        )?;
        Ok(())
    }

    /// Flips a single season slot to active, leaving the other slots alone
    pub fn mark_season_active(
        &self,
        table: &str,
        year: &str,
        season_type: SeasonType,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            &format!(
                "UPDATE \"{}\" SET {} = 1 WHERE year = ?1",
                table,
                season_type.column()
            ),
            params![year],
        )?;
        Ok(())
    }

    // ===== Shots =====

    /// Composite keys already present in a shot table
    pub fn shot_keys(&self, table: &str) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT shot_key FROM \"{}\"", table))?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<HashSet<_>, _>>()?;
        Ok(keys)
    }

    pub fn insert_shot(&self, table: &str, shot: &ShotRecord) -> Result<(), StoreError> {
        let placeholders: Vec<String> = (1..=SHOT_COLUMNS.len()).map(|i| format!("?{}", i)).collect();
        self.conn.execute(
            &format!(
                "INSERT INTO \"{}\" ({}) VALUES ({})",
                table,
                SHOT_COLUMNS.join(", "),
                placeholders.join(", ")
            ),
            params![
                shot.shot_key,
                shot.player_id,
                shot.player_last,
                shot.player_first,
                shot.season,
                shot.season_type,
                shot.game_id,
                shot.game_event_id,
                shot.game_date.to_string(),
                shot.clock,
                shot.minutes,
                shot.seconds,
                shot.x,
                shot.y,
                shot.distance,
                shot.made,
                shot.period,
                shot.shot_type,
                shot.play_type,
                shot.team_id,
                shot.team_name,
                shot.away_team_id,
                shot.away_team_name,
                shot.home_team_id,
                shot.home_team_name,
                shot.at_home,
                shot.zone_basic,
                shot.zone_area,
                shot.zone_range
            ],
        )?;
        Ok(())
    }

    // ===== Reconciliation reads =====

    /// Values of one key column, as strings
    pub fn key_values(&self, table: &str, key_column: &str) -> Result<HashSet<String>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT \"{}\" FROM \"{}\"", key_column, table))?;
        let mut values = HashSet::new();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            values.insert(value_to_string(row.get_ref(0)?));
        }
        Ok(values)
    }

    /// Every row of a table concatenated into one signature string
    ///
    /// Columns are joined with `_` in the statement's column order, so two
    /// replicas produce comparable signatures for identical rows.
    pub fn row_signatures(
        &self,
        table: &str,
        player_id: Option<i64>,
    ) -> Result<HashSet<String>, StoreError> {
        let sql = match player_id {
            Some(_) => format!("SELECT * FROM \"{}\" WHERE player_id = ?1", table),
            None => format!("SELECT * FROM \"{}\"", table),
        };
        let mut stmt = self.conn.prepare(&sql)?;
        let column_count = stmt.column_count();

        let mut signatures = HashSet::new();
        let mut rows = match player_id {
            Some(id) => stmt.query(params![id])?,
            None => stmt.query([])?,
        };
        while let Some(row) = rows.next()? {
            let mut parts = Vec::with_capacity(column_count);
            for i in 0..column_count {
                parts.push(value_to_string(row.get_ref(i)?));
            }
            signatures.insert(parts.join("_"));
        }
        Ok(signatures)
    }
}

fn row_to_player(row: &Row<'_>) -> rusqlite::Result<PlayerFacts> {
    Ok(PlayerFacts {
        id: row.get(0)?,
        last_name: row.get(1)?,
        first_name: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        first_active_year: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        most_recent_active_year: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        currently_active: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
    })
}

fn value_to_string(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => hex::encode(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{season_label, ACTIVE, UNKNOWN};

    fn sample_player(id: i64, active: i64, recent_year: i64) -> PlayerFacts {
        PlayerFacts {
            id,
            last_name: format!("Last{}", id),
            first_name: format!("First{}", id),
            first_active_year: season_label(2010),
            most_recent_active_year: season_label(recent_year),
            currently_active: active,
        }
    }

    #[test]
    fn test_player_directory_round_trip() {
        let store = ReplicaStore::open_in_memory("test").unwrap();
        store.ensure_player_base_tables().unwrap();

        let facts = sample_player(1, 1, 2021);
        store.insert_player(PLAYER_DIRECTORY_TABLE, &facts).unwrap();

        let ids = store.player_ids(PLAYER_DIRECTORY_TABLE).unwrap();
        assert!(ids.contains(&1));

        let states = store.player_states(PLAYER_DIRECTORY_TABLE).unwrap();
        assert_eq!(states[&1].currently_active, 1);
        assert_eq!(states[&1].most_recent_active_year, "2021-22");
    }

    #[test]
    fn test_update_player_field_is_targeted() {
        let store = ReplicaStore::open_in_memory("test").unwrap();
        store.ensure_player_base_tables().unwrap();
        store
            .insert_player(PLAYER_DIRECTORY_TABLE, &sample_player(2, 1, 2020))
            .unwrap();

        store
            .update_player_field(
                PLAYER_DIRECTORY_TABLE,
                2,
                &PlayerField::CurrentlyActive(0),
            )
            .unwrap();

        let states = store.player_states(PLAYER_DIRECTORY_TABLE).unwrap();
        assert_eq!(states[&2].currently_active, 0);
        // The other mutable field is untouched
        assert_eq!(states[&2].most_recent_active_year, "2020-21");
    }

    #[test]
    fn test_scan_players_filters() {
        let store = ReplicaStore::open_in_memory("test").unwrap();
        store.ensure_player_base_tables().unwrap();

        store
            .insert_player(PLAYER_RELEVANT_TABLE, &sample_player(1, 0, 2019))
            .unwrap();
        store
            .insert_player(PLAYER_RELEVANT_TABLE, &sample_player(2, 1, 2019))
            .unwrap();
        store
            .insert_player(PLAYER_RELEVANT_TABLE, &sample_player(3, 0, 2021))
            .unwrap();
        store
            .insert_player(PLAYER_RELEVANT_TABLE, &sample_player(4, 1, 2021))
            .unwrap();

        let all = store.scan_players(PLAYER_RELEVANT_TABLE, false, None).unwrap();
        assert_eq!(all.len(), 4);

        let active = store.scan_players(PLAYER_RELEVANT_TABLE, true, None).unwrap();
        let mut ids: Vec<i64> = active.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![2, 4]);

        let current = store
            .scan_players(PLAYER_RELEVANT_TABLE, false, Some("2021-22"))
            .unwrap();
        let mut ids: Vec<i64> = current.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![3, 4]);

        let both = store
            .scan_players(PLAYER_RELEVANT_TABLE, true, Some("2021-22"))
            .unwrap();
        assert_eq!(both.len(), 1);
        assert_eq!(both[0].id, 4);
    }

    #[test]
    fn test_activity_rows_and_slot_update() {
        let store = ReplicaStore::open_in_memory("test").unwrap();
        let table = "Doe_Jon_9_individual_data";
        store.ensure_activity_table(table).unwrap();

        let activity = SeasonActivity {
            reg: ACTIVE,
            preseason: UNKNOWN,
            playoffs: UNKNOWN,
        };
        store.insert_activity_row(table, "2015-16", &activity).unwrap();
        store
            .mark_season_active(table, "2015-16", SeasonType::Playoffs)
            .unwrap();

        let rows = store.activity_rows(table).unwrap();
        assert_eq!(rows["2015-16"].reg, ACTIVE);
        assert_eq!(rows["2015-16"].playoffs, ACTIVE);
        assert_eq!(rows["2015-16"].preseason, UNKNOWN);
    }

    #[test]
    fn test_row_signatures_use_column_order() {
        let store = ReplicaStore::open_in_memory("test").unwrap();
        let table = "Doe_Jon_9_individual_data";
        store.ensure_activity_table(table).unwrap();
        store
            .insert_activity_row(table, "2015-16", &SeasonActivity::default())
            .unwrap();

        let signatures = store.row_signatures(table, None).unwrap();
        assert!(signatures.contains("2015-16_-1_-1_-1"));
    }
}
