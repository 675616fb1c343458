//! Per-player-season shot ingest
//!
//! Each worker pops a player, reads their active seasons from the primary
//! player replica, fetches the shot chart for every (season, season type)
//! pair, and inserts the shots it has not seen before into the per-player
//! table and the `all_shots` rollup on both shot replicas.
//!
//! The upstream delivers one flat array per shot whose column order is an
//! implementation detail; [`source`] is the fixed index table remapping it
//! into the canonical column order of [`crate::storage::schema::SHOT_COLUMNS`].

use crate::crawl::pool::{EntityWorker, RunTally};
use crate::model::{
    canonical_abbr, format_clock, shot_key, PlayerFacts, SeasonType, ShotRecord,
};
use crate::platform::Platform;
use crate::storage::{ReplicaPair, ALL_SHOTS_TABLE};
use crate::{LedgerError, Result};
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Source array positions of a shot-chart row
///
/// Positions 0, 4, 19 and 20 carry values the canonical schema derives
/// differently (the key, the player name, score context) and are unused.
pub mod source {
    pub const GAME_ID: usize = 1;
    pub const GAME_EVENT_ID: usize = 2;
    pub const PLAYER_ID: usize = 3;
    pub const TEAM_ID: usize = 5;
    pub const TEAM_NAME: usize = 6;
    pub const PERIOD: usize = 7;
    pub const MINUTES: usize = 8;
    pub const SECONDS: usize = 9;
    pub const OUTCOME: usize = 10;
    pub const PLAY_TYPE: usize = 11;
    pub const SHOT_TYPE: usize = 12;
    pub const ZONE_BASIC: usize = 13;
    pub const ZONE_AREA: usize = 14;
    pub const ZONE_RANGE: usize = 15;
    pub const DISTANCE: usize = 16;
    pub const X: usize = 17;
    pub const Y: usize = 18;
    pub const GAME_DATE: usize = 21;
    pub const HOME_TEAM_ABBR: usize = 22;
    pub const AWAY_TEAM_ABBR: usize = 23;
}

/// Whether a crawl revisits everything or only the current season
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotCrawlMode {
    /// First-time crawl: every active season, skipping tables that exist
    Backfill,
    /// Incremental crawl: the current season and season type only
    CurrentSeason,
}

/// Worker crawling shots for one player at a time
pub struct ShotWorker {
    platform: Arc<Platform>,
    players: ReplicaPair,
    shots: ReplicaPair,
    team_map: HashMap<String, i64>,
    /// Snapshot of existing shot tables, taken once per worker for backfills
    existing_tables: Option<HashSet<String>>,
    mode: ShotCrawlMode,
}

impl ShotWorker {
    pub fn new(platform: Arc<Platform>, mode: ShotCrawlMode) -> Result<Self> {
        let players = platform.open_players()?;
        let shots = platform.open_shots()?;
        shots.ensure_both(|store| store.ensure_all_shots_table())?;

        let team_map = players.primary.team_abbr_map()?;
        let existing_tables = match mode {
            ShotCrawlMode::Backfill => Some(shots.primary.table_names()?),
            ShotCrawlMode::CurrentSeason => None,
        };

        Ok(Self {
            platform,
            players,
            shots,
            team_map,
            existing_tables,
            mode,
        })
    }

    /// The (season, season type) pairs this player needs crawled
    fn seasons_to_crawl(&self, player: &PlayerFacts) -> Result<Vec<(String, SeasonType)>> {
        let detail_table = player.detail_table_name();
        match self.mode {
            ShotCrawlMode::CurrentSeason => {
                let season = self.platform.current_season();
                let season_type = self.platform.current_season_type();
                let years =
                    self.players
                        .primary
                        .activity_for_season(&detail_table, season, season_type)?;
                Ok(years.into_iter().map(|year| (year, season_type)).collect())
            }
            ShotCrawlMode::Backfill => {
                let rows = self.players.primary.activity_rows(&detail_table)?;
                let mut pairs = Vec::new();
                for (year, activity) in rows {
                    for season_type in activity.active_types() {
                        pairs.push((year.clone(), season_type));
                    }
                }
                pairs.sort_by(|a, b| (a.0.as_str(), a.1.column()).cmp(&(b.0.as_str(), b.1.column())));
                Ok(pairs)
            }
        }
    }

    fn crawl_one_season(
        &self,
        player: &PlayerFacts,
        season: &str,
        season_type: SeasonType,
        tally: &RunTally,
    ) -> Result<()> {
        let table = player.shot_table_name(season, season_type);

        if let Some(existing) = &self.existing_tables {
            if existing.contains(&table) {
                tracing::debug!("Skipping existing table {}", table);
                return Ok(());
            }
        }

        let url = self.platform.shot_chart_url(season, player.id, season_type);
        let body = self.platform.fetch_with_retry(&url)?;
        let rows = parse_shot_rows(&body, &url)?;

        self.shots.ensure_both(|store| store.ensure_shot_table(&table))?;

        if rows.is_empty() {
            tracing::info!("{}: no shots taken", table);
            return Ok(());
        }

        // Keys present before this batch started; only loaded incrementally,
        // a backfill starts from a table this worker just created.
        let existing_keys = match self.mode {
            ShotCrawlMode::CurrentSeason => self.shots.primary.shot_keys(&table)?,
            ShotCrawlMode::Backfill => HashSet::new(),
        };

        let mut records = Vec::new();
        for row in &rows {
            match decode_shot_row(row, player, season, season_type, &self.team_map) {
                Some(record) => records.push(record),
                None => tracing::warn!("{}: skipping malformed shot row", table),
            }
        }

        let new_count = insert_shots(&self.shots, &table, &records, &existing_keys);
        tracing::info!(
            "{}: total shots {}, new shots {}",
            table,
            existing_keys.len() + new_count as usize,
            new_count
        );
        tally.add_new_shots(new_count);
        Ok(())
    }
}

impl EntityWorker for ShotWorker {
    fn process(&mut self, player: &PlayerFacts, tally: &RunTally) -> Result<()> {
        for (season, season_type) in self.seasons_to_crawl(player)? {
            self.crawl_one_season(player, &season, season_type, tally)?;
        }
        Ok(())
    }
}

/// Extracts the flat shot arrays from a shot-chart response
pub fn parse_shot_rows(body: &str, url: &str) -> Result<Vec<Value>> {
    let shape = |message: &str| LedgerError::ResponseShape {
        url: url.to_string(),
        message: message.to_string(),
    };

    let root: Value =
        serde_json::from_str(body).map_err(|e| shape(&format!("not JSON: {}", e)))?;
    let rows = root
        .get("resultSets")
        .and_then(Value::as_array)
        .and_then(|sets| sets.first())
        .and_then(|set| set.get("rowSet"))
        .and_then(Value::as_array)
        .ok_or_else(|| shape("missing resultSets[0].rowSet"))?;

    Ok(rows.clone())
}

/// Remaps one source row into a canonical shot record
///
/// Returns `None` when a required value is missing or unreadable; the row is
/// skipped, never the whole batch. An unresolvable team abbreviation is not
/// an error: the id columns get the -1 sentinel and the row is kept.
pub fn decode_shot_row(
    row: &Value,
    player: &PlayerFacts,
    season: &str,
    season_type: SeasonType,
    team_map: &HashMap<String, i64>,
) -> Option<ShotRecord> {
    let cells = row.as_array()?;

    let game_id = cell_i64(cells, source::GAME_ID)?;
    let game_event_id = cell_i64(cells, source::GAME_EVENT_ID)?;
    let player_id = cell_i64(cells, source::PLAYER_ID)?;
    let team_id = cell_i64(cells, source::TEAM_ID)?;
    let minutes = cell_i64(cells, source::MINUTES)?;
    let seconds = cell_i64(cells, source::SECONDS)?;

    let home_abbr = cell_str(cells, source::HOME_TEAM_ABBR)?;
    let away_abbr = cell_str(cells, source::AWAY_TEAM_ABBR)?;
    let home_team_id = resolve_team_id(home_abbr, team_map);
    let away_team_id = resolve_team_id(away_abbr, team_map);

    let game_date =
        NaiveDate::parse_from_str(cell_str(cells, source::GAME_DATE)?, "%Y%m%d").ok()?;

    // The source has no boolean for makes; the outcome string carries it
    let made = i64::from(cell_str(cells, source::OUTCOME)?.contains("Made"));

    Some(ShotRecord {
        shot_key: shot_key(player_id, game_id, game_event_id),
        player_id,
        player_last: player.last_name.clone(),
        player_first: player.first_name.clone(),
        season: season.to_string(),
        season_type: season_type.display_name().to_string(),
        game_id,
        game_event_id,
        game_date,
        clock: format_clock(minutes, seconds),
        minutes,
        seconds,
        x: cell_i64(cells, source::X)?,
        y: cell_i64(cells, source::Y)?,
        distance: cell_i64(cells, source::DISTANCE)?,
        made,
        period: cell_i64(cells, source::PERIOD)?,
        shot_type: cell_str(cells, source::SHOT_TYPE)?.to_string(),
        play_type: cell_str(cells, source::PLAY_TYPE)?.to_string(),
        team_id,
        team_name: cell_str(cells, source::TEAM_NAME)?.to_string(),
        away_team_id,
        away_team_name: away_abbr.to_string(),
        home_team_id,
        home_team_name: home_abbr.to_string(),
        at_home: i64::from(team_id == home_team_id && home_team_id != -1),
        zone_basic: cell_str(cells, source::ZONE_BASIC)?.to_string(),
        zone_area: cell_str(cells, source::ZONE_AREA)?.to_string(),
        zone_range: cell_str(cells, source::ZONE_RANGE)?.to_string(),
    })
}

/// Resolves a team abbreviation to its id, via the alias table for
/// relocated franchises; unknown abbreviations get the -1 sentinel
fn resolve_team_id(abbr: &str, team_map: &HashMap<String, i64>) -> i64 {
    team_map
        .get(canonical_abbr(abbr))
        .copied()
        .unwrap_or(-1)
}

/// Inserts the records absent from `existing_keys` into the season table and
/// the rollup on both replicas
///
/// A batch-local seen set prevents writing a key twice even when the
/// upstream response itself contains duplicates; it is distinct from
/// `existing_keys`, which reflects state from before the batch started.
pub fn insert_shots(
    shots: &ReplicaPair,
    table: &str,
    records: &[ShotRecord],
    existing_keys: &HashSet<String>,
) -> u64 {
    let mut seen_this_batch: HashSet<&str> = HashSet::new();
    let mut new_count = 0;

    for record in records {
        if existing_keys.contains(&record.shot_key) {
            continue;
        }
        if !seen_this_batch.insert(record.shot_key.as_str()) {
            continue;
        }

        shots.write_both("insert shot", |store| {
            store.insert_shot(table, record)?;
            store.insert_shot(ALL_SHOTS_TABLE, record)
        });
        new_count += 1;
    }

    new_count
}

fn cell_i64(cells: &[Value], index: usize) -> Option<i64> {
    match cells.get(index)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn cell_str(cells: &[Value], index: usize) -> Option<&str> {
    cells.get(index)?.as_str()
}
