//! Domain entities: players, teams, shots, and season activity
//!
//! Entity keys are assigned by the upstream and immutable: numeric ids for
//! players and teams, the composite `(player, game, event)` key for shots.

mod player;
mod season;
mod shot;
mod team;

pub use player::{sanitize_name, PlayerFacts};
pub use season::{label_start_year, season_label, SeasonActivity, SeasonType, ACTIVE, UNKNOWN};
pub use shot::{format_clock, shot_key, ShotRecord};
pub use team::{canonical_abbr, TeamFacts, TEAM_ABBR_ALIASES};
