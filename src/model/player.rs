use crate::model::season::{season_label, SeasonType};

/// Basic player facts, as carried by the roster feed and the frontier
///
/// This is both the directory row shape and the descriptor workers pop from
/// the frontier: it is denormalized enough that a worker never needs a join
/// back to the directory tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerFacts {
    pub id: i64,
    pub last_name: String,
    pub first_name: String,
    pub first_active_year: String,
    pub most_recent_active_year: String,
    pub currently_active: i64,
}

impl PlayerFacts {
    /// Name of this player's per-year activity table
    pub fn detail_table_name(&self) -> String {
        format!(
            "{}_{}_{}_individual_data",
            sanitize_name(&self.last_name),
            sanitize_name(&self.first_name),
            self.id
        )
    }

    /// Name of this player's shot table for one season and season type
    pub fn shot_table_name(&self, season: &str, season_type: SeasonType) -> String {
        format!(
            "{}_{}_{}_{}_{}_{}",
            sanitize_name(&self.last_name),
            sanitize_name(&self.first_name),
            self.id,
            &season[..4],
            &season[5..],
            season_type.table_suffix()
        )
    }

    /// Parses one player record from the roster feed token array
    ///
    /// The feed packs a variable number of name components before the flags:
    /// `[id, last, first?, third?, active, firstYear, recentYear, ...]`. The
    /// activity flag is located as the first `0`/`1` token and the year pair
    /// as the first 4-digit token and its successor; the name components are
    /// whatever sits between the id and the activity flag. Returns `None`
    /// when the record does not carry all three landmarks.
    pub fn from_roster_tokens(tokens: &[&str]) -> Option<PlayerFacts> {
        let (activity_idx, first_year_idx, recent_year_idx) = find_landmark_indexes(tokens)?;

        let id: i64 = tokens.first()?.parse().ok()?;
        let currently_active: i64 = tokens[activity_idx].parse().ok()?;
        let first_year: i64 = tokens[first_year_idx].parse().ok()?;
        let recent_year: i64 = tokens.get(recent_year_idx)?.parse().ok()?;

        let last_name = tokens.get(1)?.to_string();
        // Single-name players have the activity flag at index 2
        let first_name = if activity_idx >= 3 {
            tokens.get(2)?.trim().to_string()
        } else {
            String::new()
        };

        Some(PlayerFacts {
            id,
            last_name,
            first_name,
            first_active_year: season_label(first_year),
            most_recent_active_year: season_label(recent_year),
            currently_active,
        })
    }
}

/// Locates the activity flag and the active-year pair in a roster record
///
/// Returns `(activity, first_year, recent_year)` token indexes, or `None`
/// when either landmark is missing.
fn find_landmark_indexes(tokens: &[&str]) -> Option<(usize, usize, usize)> {
    let mut activity_idx = None;
    let mut year_idx = None;

    for (i, token) in tokens.iter().enumerate().skip(1) {
        if activity_idx.is_none() && (*token == "0" || *token == "1") {
            activity_idx = Some(i);
        }
        if year_idx.is_none() && token.len() == 4 && token.chars().all(|c| c.is_ascii_digit()) {
            year_idx = Some(i);
        }
    }

    match (activity_idx, year_idx) {
        (Some(a), Some(y)) if y + 1 < tokens.len() => Some((a, y, y + 1)),
        _ => None,
    }
}

/// Strips everything but ASCII alphanumerics, for use in table names
pub fn sanitize_name(name: &str) -> String {
    name.chars().filter(|c| c.is_ascii_alphanumeric()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_name_player_parses() {
        let tokens = vec!["12", "Bar", "Foo", "1", "2015", "2020"];
        let facts = PlayerFacts::from_roster_tokens(&tokens).unwrap();

        assert_eq!(facts.id, 12);
        assert_eq!(facts.last_name, "Bar");
        assert_eq!(facts.first_name, "Foo");
        assert_eq!(facts.currently_active, 1);
        assert_eq!(facts.first_active_year, "2015-16");
        assert_eq!(facts.most_recent_active_year, "2020-21");
    }

    #[test]
    fn test_single_name_player_parses() {
        let tokens = vec!["13", "Foo", "0", "2015", "2020"];
        let facts = PlayerFacts::from_roster_tokens(&tokens).unwrap();

        assert_eq!(facts.last_name, "Foo");
        assert_eq!(facts.first_name, "");
        assert_eq!(facts.currently_active, 0);
    }

    #[test]
    fn test_three_name_player_parses() {
        // Active players carry a team component after the activity flag
        let tokens = vec!["14", "Bar", "Foo", "Jr", "1", "2010", "2021"];
        let facts = PlayerFacts::from_roster_tokens(&tokens).unwrap();

        assert_eq!(facts.last_name, "Bar");
        assert_eq!(facts.first_name, "Foo");
        assert_eq!(facts.first_active_year, "2010-11");
        assert_eq!(facts.most_recent_active_year, "2021-22");
    }

    #[test]
    fn test_record_without_landmarks_is_rejected() {
        assert!(PlayerFacts::from_roster_tokens(&["15", "Bar"]).is_none());
        assert!(PlayerFacts::from_roster_tokens(&["15", "Bar", "1"]).is_none());
        assert!(PlayerFacts::from_roster_tokens(&[]).is_none());
    }

    #[test]
    fn test_table_names_are_sanitized() {
        let facts = PlayerFacts {
            id: 77,
            last_name: "O'Neal".to_string(),
            first_name: "Shaquille".to_string(),
            first_active_year: "1996-97".to_string(),
            most_recent_active_year: "2010-11".to_string(),
            currently_active: 0,
        };

        assert_eq!(facts.detail_table_name(), "ONeal_Shaquille_77_individual_data");
        assert_eq!(
            facts.shot_table_name("1999-00", SeasonType::Playoffs),
            "ONeal_Shaquille_77_1999_00_Playoffs"
        );
    }
}
