//! Team and player directory ingest
//!
//! Fetches the combined roster feed once, parses its quasi-JSON body into
//! token records, and upserts every team and player into both replicas. This
//! is the single-threaded stage that seeds the directory tables everything
//! else scans.

use crate::crawl::WriteOutcome;
use crate::model::{label_start_year, PlayerFacts, TeamFacts};
use crate::platform::Platform;
use crate::storage::{PlayerField, PlayerState, ReplicaPair, PLAYER_DIRECTORY_TABLE, PLAYER_RELEVANT_TABLE};
use crate::{LedgerError, Result};
use std::collections::{HashMap, HashSet};

/// Players older than this season start year never enter the narrow table;
/// the upstream has no shot data before the 1996-97 season.
pub const RELEVANT_FROM_YEAR: i64 = 1996;

/// Counts reported at the end of a directory sync
#[derive(Debug, Default)]
pub struct RosterSummary {
    pub teams_added: u64,
    pub players_added: u64,
    pub players_updated: u64,
    pub players_unchanged: u64,
}

/// Refreshes both player replicas from the roster feed
pub fn sync_directory(platform: &Platform, pair: &ReplicaPair) -> Result<RosterSummary> {
    pair.ensure_both(|store| store.ensure_player_base_tables())?;

    let url = &platform.config().upstream.roster_url;
    let body = platform.fetch_with_retry(url)?;
    let (team_records, player_records) = split_roster_feed(&body).ok_or_else(|| {
        LedgerError::ResponseShape {
            url: url.clone(),
            message: "feed is missing the teams/players sections".to_string(),
        }
    })?;

    let mut summary = RosterSummary::default();

    ingest_teams(pair, &team_records, &mut summary);
    ingest_players(pair, &player_records, &mut summary)?;

    tracing::info!(
        "Directory sync: {} teams added, {} players added, {} updated, {} unchanged",
        summary.teams_added,
        summary.players_added,
        summary.players_updated,
        summary.players_unchanged
    );
    Ok(summary)
}

/// Splits the quasi-JSON roster body into raw team and player records
///
/// The feed is a JavaScript data blob, not strict JSON: the reliable
/// structure is the `"teams"` and `"players"` section markers, `]]`-separated
/// team records, and `]`-separated player records.
pub fn split_roster_feed(body: &str) -> Option<(Vec<String>, Vec<String>)> {
    let (_, after_teams) = body.split_once("\"teams\"")?;
    let (teams_section, players_section) = after_teams.split_once("\"players\"")?;

    let teams = section_records(teams_section, "]]");
    let players = section_records(players_section, "]");
    Some((teams, players))
}

fn section_records(section: &str, separator: &str) -> Vec<String> {
    section.split(separator).map(|s| s.to_string()).collect()
}

/// Tokenizes one raw record: strips structural characters and comma-splits
///
/// Records after the first retain the separating comma from the split; it is
/// removed before stripping.
pub fn tokenize_record(record: &str, is_first: bool) -> Vec<String> {
    let record = if is_first {
        record.to_string()
    } else {
        record.replacen(',', "", 1)
    };
    record
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '}' | ';' | '"'))
        .collect::<String>()
        .split(',')
        .map(|s| s.to_string())
        .collect()
}

fn ingest_teams(pair: &ReplicaPair, records: &[String], summary: &mut RosterSummary) {
    // The known-id set spans both replicas so a team missing from only one
    // side is not double-inserted into the other.
    let mut known = HashSet::new();
    for store in [&pair.primary, &pair.secondary] {
        match store.team_ids() {
            Ok(ids) => known.extend(ids),
            Err(e) => tracing::error!("Failed listing teams on {}: {}", store.label(), e),
        }
    }

    for (index, record) in records.iter().enumerate() {
        let tokens = tokenize_record(record, index == 0);
        let token_refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let Some(team) = TeamFacts::from_roster_tokens(&token_refs) else {
            continue;
        };

        if known.contains(&team.id) {
            tracing::debug!("Team already known: {} {}", team.first_name, team.second_name);
            continue;
        }

        tracing::info!("Adding team: {} {}", team.first_name, team.second_name);
        pair.write_both("insert team", |store| store.insert_team(&team));
        summary.teams_added += 1;
    }
}

fn ingest_players(
    pair: &ReplicaPair,
    records: &[String],
    summary: &mut RosterSummary,
) -> Result<()> {
    let mut known = pair.primary.player_ids(PLAYER_DIRECTORY_TABLE)?;
    known.extend(pair.secondary.player_ids(PLAYER_DIRECTORY_TABLE)?);
    let states = pair.primary.player_states(PLAYER_DIRECTORY_TABLE)?;

    for (index, record) in records.iter().enumerate() {
        let tokens = tokenize_record(record, index == 0);
        let token_refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
        let Some(facts) = PlayerFacts::from_roster_tokens(&token_refs) else {
            continue;
        };

        match upsert_player(pair, &facts, &known, &states) {
            WriteOutcome::Inserted => {
                tracing::info!("Added player: {} {}", facts.first_name, facts.last_name);
                summary.players_added += 1;
            }
            WriteOutcome::Updated => {
                tracing::info!("Updated player: {} {}", facts.first_name, facts.last_name);
                summary.players_updated += 1;
            }
            WriteOutcome::NoOp => summary.players_unchanged += 1,
        }
    }
    Ok(())
}

/// Idempotent directory upsert for one player
///
/// Exactly one of insert, targeted update(s), or no-op happens per call:
/// * absent key: full insert into the broad table on both replicas, plus the
///   narrow table when the player falls inside the retained window
/// * present key: each mutable field whose scraped value differs from the
///   stored state gets its own targeted update; untouched fields are left
///   alone; nothing differing is a no-op
pub fn upsert_player(
    pair: &ReplicaPair,
    facts: &PlayerFacts,
    existing_ids: &HashSet<i64>,
    states: &HashMap<i64, PlayerState>,
) -> WriteOutcome {
    if !existing_ids.contains(&facts.id) {
        pair.write_both("insert player", |store| {
            store.insert_player(PLAYER_DIRECTORY_TABLE, facts)
        });
        if within_retained_window(&facts.most_recent_active_year) {
            pair.write_both("insert relevant player", |store| {
                store.insert_player(PLAYER_RELEVANT_TABLE, facts)
            });
        }
        return WriteOutcome::Inserted;
    }

    let mut changed_fields: Vec<PlayerField> = Vec::new();
    match states.get(&facts.id) {
        Some(state) => {
            if state.currently_active != facts.currently_active {
                changed_fields.push(PlayerField::CurrentlyActive(facts.currently_active));
            }
            if state.most_recent_active_year != facts.most_recent_active_year {
                changed_fields.push(PlayerField::MostRecentActiveYear(
                    facts.most_recent_active_year.clone(),
                ));
            }
        }
        // Known on the secondary only; refresh both mutable fields so the
        // secondary converges and leave the missing primary row to the
        // reconciler.
        None => {
            changed_fields.push(PlayerField::CurrentlyActive(facts.currently_active));
            changed_fields.push(PlayerField::MostRecentActiveYear(
                facts.most_recent_active_year.clone(),
            ));
        }
    }

    if changed_fields.is_empty() {
        return WriteOutcome::NoOp;
    }

    for field in &changed_fields {
        apply_field_update(pair, facts, field);
    }
    WriteOutcome::Updated
}

fn apply_field_update(pair: &ReplicaPair, facts: &PlayerFacts, field: &PlayerField) {
    pair.write_both("update player field", |store| {
        store.update_player_field(PLAYER_DIRECTORY_TABLE, facts.id, field)
    });

    // The narrow table only tracks retained-window players
    if within_retained_window(&facts.most_recent_active_year) {
        pair.write_both("update relevant player field", |store| {
            store.update_player_field(PLAYER_RELEVANT_TABLE, facts.id, field)
        });
    }
}

fn within_retained_window(most_recent_active_year: &str) -> bool {
    label_start_year(most_recent_active_year).is_some_and(|y| y >= RELEVANT_FROM_YEAR)
}
