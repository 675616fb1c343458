/// Basic team facts from the roster feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamFacts {
    pub id: i64,
    pub abbr: String,
    pub casual_name: String,
    pub first_name: String,
    pub second_name: String,
}

impl TeamFacts {
    /// Parses one team record from the roster feed token array
    ///
    /// Layout is fixed: `[id, abbr, casualName, firstName, secondName, ...]`.
    /// Returns `None` for padding records with no id.
    pub fn from_roster_tokens(tokens: &[&str]) -> Option<TeamFacts> {
        let id: i64 = tokens.first()?.parse().ok()?;
        Some(TeamFacts {
            id,
            abbr: tokens.get(1)?.to_string(),
            casual_name: tokens.get(2)?.to_string(),
            first_name: tokens.get(3)?.to_string(),
            second_name: tokens.get(4)?.to_string(),
        })
    }
}

/// Relocated or rebranded franchises keep their old abbreviation in
/// historical shot rows; this maps each retired abbreviation to the
/// franchise's current one before the team-id lookup.
pub const TEAM_ABBR_ALIASES: [(&str, &str); 6] = [
    ("NJN", "BKN"),
    ("VAN", "MEM"),
    ("NOK", "NOP"),
    ("NOH", "NOP"),
    ("SEA", "OKC"),
    ("CHH", "CHA"),
];

/// Resolves a possibly-retired abbreviation to its current form
pub fn canonical_abbr(abbr: &str) -> &str {
    TEAM_ABBR_ALIASES
        .iter()
        .find(|(old, _)| *old == abbr)
        .map(|(_, new)| *new)
        .unwrap_or(abbr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_parses() {
        let tokens = vec!["1610612751", "BKN", "Nets", "Brooklyn", "Nets"];
        let team = TeamFacts::from_roster_tokens(&tokens).unwrap();
        assert_eq!(team.id, 1610612751);
        assert_eq!(team.abbr, "BKN");
        assert_eq!(team.first_name, "Brooklyn");
    }

    #[test]
    fn test_empty_record_rejected() {
        assert!(TeamFacts::from_roster_tokens(&[""]).is_none());
        assert!(TeamFacts::from_roster_tokens(&[]).is_none());
    }

    #[test]
    fn test_canonical_abbr() {
        assert_eq!(canonical_abbr("SEA"), "OKC");
        assert_eq!(canonical_abbr("NOH"), "NOP");
        assert_eq!(canonical_abbr("LAL"), "LAL");
    }
}
