use chrono::NaiveDate;

/// One shot event in canonical column order
///
/// Immutable once written; the composite key is the sole de-duplication
/// mechanism and shots are never updated, only inserted when absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ShotRecord {
    pub shot_key: String,
    pub player_id: i64,
    pub player_last: String,
    pub player_first: String,
    pub season: String,
    pub season_type: String,
    pub game_id: i64,
    pub game_event_id: i64,
    pub game_date: NaiveDate,
    pub clock: String,
    pub minutes: i64,
    pub seconds: i64,
    pub x: i64,
    pub y: i64,
    pub distance: i64,
    pub made: i64,
    pub period: i64,
    pub shot_type: String,
    pub play_type: String,
    pub team_id: i64,
    pub team_name: String,
    pub away_team_id: i64,
    pub away_team_name: String,
    pub home_team_id: i64,
    pub home_team_name: String,
    pub at_home: i64,
    pub zone_basic: String,
    pub zone_area: String,
    pub zone_range: String,
}

/// Builds the composite shot key: `{playerID}-{gameID}-{eventID}`
///
/// The key is what the idempotent writer checks before inserting and what
/// the reconciler compares in keys-only mode.
pub fn shot_key(player_id: i64, game_id: i64, game_event_id: i64) -> String {
    format!("{}-{}-{}", player_id, game_id, game_event_id)
}

/// Formats the remaining game clock as `M:SS`
pub fn format_clock(minutes: i64, seconds: i64) -> String {
    format!("{}:{:02}", minutes, seconds)
}
