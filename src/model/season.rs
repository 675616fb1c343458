use serde::Deserialize;

/// Activity value for a season slot that has never been observed active
pub const UNKNOWN: i64 = -1;
/// Activity value for a season slot observed active at least once
pub const ACTIVE: i64 = 1;

/// One of the three independently-tracked portions of a season
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonType {
    #[serde(rename = "reg")]
    Regular,
    Preseason,
    Playoffs,
}

impl Default for SeasonType {
    fn default() -> Self {
        SeasonType::Regular
    }
}

impl SeasonType {
    pub const ALL: [SeasonType; 3] = [
        SeasonType::Regular,
        SeasonType::Preseason,
        SeasonType::Playoffs,
    ];

    /// Column name in the per-player activity tables
    pub fn column(&self) -> &'static str {
        match self {
            SeasonType::Regular => "reg",
            SeasonType::Preseason => "preseason",
            SeasonType::Playoffs => "playoffs",
        }
    }

    /// Human-readable name, as stored in shot rows
    pub fn display_name(&self) -> &'static str {
        match self {
            SeasonType::Regular => "Regular Season",
            SeasonType::Preseason => "Preseason",
            SeasonType::Playoffs => "Playoffs",
        }
    }

    /// The form the upstream query string expects
    pub fn url_param(&self) -> &'static str {
        match self {
            SeasonType::Regular => "Regular+Season",
            SeasonType::Preseason => "Pre+Season",
            SeasonType::Playoffs => "Playoffs",
        }
    }

    /// Suffix used in per-player-season shot table names
    pub fn table_suffix(&self) -> &'static str {
        match self {
            SeasonType::Regular => "RegularSeason",
            SeasonType::Preseason => "Preseason",
            SeasonType::Playoffs => "Playoffs",
        }
    }

    /// First season start year with shot data for this season type
    pub fn first_available_year(&self) -> i64 {
        match self {
            SeasonType::Preseason => 2005,
            _ => 1996,
        }
    }
}

/// Per-year activity vector: one slot per season type
///
/// A slot is either unknown (-1) or active (1). There is no confirmed-inactive
/// state; a slot set active never reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeasonActivity {
    pub reg: i64,
    pub preseason: i64,
    pub playoffs: i64,
}

impl Default for SeasonActivity {
    fn default() -> Self {
        Self {
            reg: UNKNOWN,
            preseason: UNKNOWN,
            playoffs: UNKNOWN,
        }
    }
}

impl SeasonActivity {
    /// An activity vector with a single slot active
    pub fn active_in(season_type: SeasonType) -> Self {
        let mut activity = Self::default();
        activity.set_active(season_type);
        activity
    }

    pub fn slot(&self, season_type: SeasonType) -> i64 {
        match season_type {
            SeasonType::Regular => self.reg,
            SeasonType::Preseason => self.preseason,
            SeasonType::Playoffs => self.playoffs,
        }
    }

    pub fn set_active(&mut self, season_type: SeasonType) {
        match season_type {
            SeasonType::Regular => self.reg = ACTIVE,
            SeasonType::Preseason => self.preseason = ACTIVE,
            SeasonType::Playoffs => self.playoffs = ACTIVE,
        }
    }

    /// Season types newly observed active here but still unknown in `stored`
    pub fn newly_active(&self, stored: &SeasonActivity) -> Vec<SeasonType> {
        SeasonType::ALL
            .iter()
            .copied()
            .filter(|st| self.slot(*st) == ACTIVE && stored.slot(*st) == UNKNOWN)
            .collect()
    }

    /// Season types with at least one observation
    pub fn active_types(&self) -> Vec<SeasonType> {
        SeasonType::ALL
            .iter()
            .copied()
            .filter(|st| self.slot(*st) == ACTIVE)
            .collect()
    }
}

/// Builds a `YYYY-YY` season label from a start year
///
/// Seasons span two calendar years; 1999 becomes "1999-00", 2015 "2015-16".
pub fn season_label(start_year: i64) -> String {
    let sub_year = (start_year - 1899) % 100;
    format!("{}-{:02}", start_year, sub_year)
}

/// Extracts the start year from a `YYYY-YY` season label
pub fn label_start_year(label: &str) -> Option<i64> {
    label.get(..4)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_season_label_wraps_century() {
        assert_eq!(season_label(1999), "1999-00");
        assert_eq!(season_label(2000), "2000-01");
        assert_eq!(season_label(2015), "2015-16");
        assert_eq!(season_label(1996), "1996-97");
    }

    #[test]
    fn test_label_start_year() {
        assert_eq!(label_start_year("2015-16"), Some(2015));
        assert_eq!(label_start_year("1999-00"), Some(1999));
        assert_eq!(label_start_year("bad"), None);
    }

    #[test]
    fn test_newly_active_ignores_already_known() {
        let stored = SeasonActivity {
            reg: ACTIVE,
            preseason: UNKNOWN,
            playoffs: UNKNOWN,
        };
        let fresh = SeasonActivity {
            reg: ACTIVE,
            preseason: ACTIVE,
            playoffs: UNKNOWN,
        };
        assert_eq!(fresh.newly_active(&stored), vec![SeasonType::Preseason]);
    }

    #[test]
    fn test_newly_active_never_reverts() {
        // A stored active slot with a fresh unknown must produce no update
        let stored = SeasonActivity {
            reg: ACTIVE,
            preseason: ACTIVE,
            playoffs: ACTIVE,
        };
        let fresh = SeasonActivity::default();
        assert!(fresh.newly_active(&stored).is_empty());
    }

    #[test]
    fn test_preseason_availability_floor() {
        assert_eq!(SeasonType::Preseason.first_available_year(), 2005);
        assert_eq!(SeasonType::Regular.first_available_year(), 1996);
        assert_eq!(SeasonType::Playoffs.first_available_year(), 1996);
    }
}
