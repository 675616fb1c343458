//! Table definitions for the player and shot replicas
//!
//! All DDL is `IF NOT EXISTS`: stages ensure the tables they touch and a
//! re-run never clobbers existing data. Dynamic table names (per-player
//! activity and shot tables) are built from sanitized components only.

/// Directory of every player the roster feed has ever carried
pub const PLAYER_DIRECTORY_TABLE: &str = "player_directory";

/// Directory restricted to players within the retained window (shot data
/// exists only from the 1996-97 season onward)
pub const PLAYER_RELEVANT_TABLE: &str = "player_relevant";

/// Directory of franchises
pub const TEAM_DIRECTORY_TABLE: &str = "team_directory";

/// Rollup table holding every shot across all players and seasons
pub const ALL_SHOTS_TABLE: &str = "all_shots";

/// Shared column layout of the two player directory tables
const PLAYER_TABLE_COLUMNS: &str = "\
    id INTEGER PRIMARY KEY,\n\
    last_name TEXT NOT NULL,\n\
    first_name TEXT,\n\
    first_active_year TEXT,\n\
    most_recent_active_year TEXT,\n\
    currently_active INTEGER";

/// DDL for one of the player directory tables
pub fn create_player_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (\n{}\n)",
        table, PLAYER_TABLE_COLUMNS
    )
}

/// DDL for the team directory
pub fn create_team_table_sql() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (\n\
            id INTEGER PRIMARY KEY,\n\
            abbr TEXT,\n\
            casual_name TEXT,\n\
            first_name TEXT,\n\
            second_name TEXT\n\
        )",
        TEAM_DIRECTORY_TABLE
    )
}

/// DDL for a per-player season-activity table
///
/// Slots default to -1 ("never observed active"); there is no
/// confirmed-inactive value.
pub fn create_activity_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (\n\
            year TEXT NOT NULL UNIQUE,\n\
            reg INTEGER NOT NULL DEFAULT -1,\n\
            preseason INTEGER NOT NULL DEFAULT -1,\n\
            playoffs INTEGER NOT NULL DEFAULT -1\n\
        )",
        table
    )
}

/// Canonical shot column list, in insert order
pub const SHOT_COLUMNS: [&str; 29] = [
    "shot_key",
    "player_id",
    "player_last",
    "player_first",
    "season",
    "season_type",
    "game_id",
    "game_event_id",
    "game_date",
    "clock",
    "minutes",
    "seconds",
    "x",
    "y",
    "distance",
    "made",
    "period",
    "shot_type",
    "play_type",
    "team_id",
    "team_name",
    "away_team_id",
    "away_team_name",
    "home_team_id",
    "home_team_name",
    "at_home",
    "zone_basic",
    "zone_area",
    "zone_range",
];

/// DDL for a shot table (the rollup and the per-player-season tables share it)
pub fn create_shot_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS \"{}\" (\n\
            shot_key TEXT PRIMARY KEY,\n\
            player_id INTEGER NOT NULL,\n\
            player_last TEXT NOT NULL,\n\
            player_first TEXT,\n\
            season TEXT NOT NULL,\n\
            season_type TEXT NOT NULL,\n\
            game_id INTEGER NOT NULL,\n\
            game_event_id INTEGER NOT NULL,\n\
            game_date TEXT NOT NULL,\n\
            clock TEXT NOT NULL,\n\
            minutes INTEGER NOT NULL,\n\
            seconds INTEGER NOT NULL,\n\
            x INTEGER NOT NULL,\n\
            y INTEGER NOT NULL,\n\
            distance INTEGER NOT NULL,\n\
            made INTEGER NOT NULL,\n\
            period INTEGER NOT NULL,\n\
            shot_type TEXT NOT NULL,\n\
            play_type TEXT NOT NULL,\n\
            team_id INTEGER NOT NULL,\n\
            team_name TEXT NOT NULL,\n\
            away_team_id INTEGER NOT NULL,\n\
            away_team_name TEXT NOT NULL,\n\
            home_team_id INTEGER NOT NULL,\n\
            home_team_name TEXT NOT NULL,\n\
            at_home INTEGER NOT NULL,\n\
            zone_basic TEXT NOT NULL,\n\
            zone_area TEXT NOT NULL,\n\
            zone_range TEXT NOT NULL\n\
        )",
        table
    )
}

/// Index speeding up per-player scans of the rollup table
pub fn create_all_shots_index_sql() -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS index_player_id ON \"{}\" (player_id)",
        ALL_SHOTS_TABLE
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shot_ddl_covers_every_canonical_column() {
        let ddl = create_shot_table_sql("sample");
        for column in SHOT_COLUMNS {
            assert!(ddl.contains(column), "missing column {}", column);
        }
    }

    #[test]
    fn test_ddl_is_idempotent_by_construction() {
        assert!(create_player_table_sql(PLAYER_DIRECTORY_TABLE).contains("IF NOT EXISTS"));
        assert!(create_activity_table_sql("x_y_1_individual_data").contains("IF NOT EXISTS"));
        assert!(create_shot_table_sql(ALL_SHOTS_TABLE).contains("IF NOT EXISTS"));
    }
}
