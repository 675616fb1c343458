use crate::config::types::{Config, SeasonConfig, StoresConfig, UpstreamConfig};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
///
/// Every recognized option is checked eagerly so a bad value fails at boot,
/// not at first use inside a worker thread.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_upstream(&config.upstream)?;
    validate_stores(&config.stores)?;
    validate_season(&config.season)?;

    if let Some(count) = config.crawler.worker_count {
        if count < 1 {
            return Err(ConfigError::Validation(
                "worker-count must be >= 1".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_upstream(config: &UpstreamConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("stats-base", &config.stats_base),
        ("roster-url", &config.roster_url),
        ("origin", &config.origin),
    ] {
        Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {}: {}", name, e)))?;
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_stores(config: &StoresConfig) -> Result<(), ConfigError> {
    let paths = [
        ("players-primary", &config.players_primary),
        ("players-secondary", &config.players_secondary),
        ("shots-primary", &config.shots_primary),
        ("shots-secondary", &config.shots_secondary),
    ];

    for (name, path) in &paths {
        if path.is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    // Replicas must be physically distinct files; a shared path would make
    // every dual write a double write into the same database.
    let mut seen = HashSet::new();
    for pair in [
        (&config.players_primary, &config.players_secondary),
        (&config.shots_primary, &config.shots_secondary),
    ] {
        if pair.0 == pair.1 {
            return Err(ConfigError::Validation(format!(
                "replica paths must be distinct, got '{}' twice",
                pair.0
            )));
        }
    }
    for (name, path) in &paths {
        if !seen.insert(path.as_str()) {
            return Err(ConfigError::Validation(format!(
                "store path '{}' ({}) is reused",
                path, name
            )));
        }
    }

    Ok(())
}

fn validate_season(config: &SeasonConfig) -> Result<(), ConfigError> {
    validate_season_label(&config.current_season)
}

/// Validates a `YYYY-YY` season label
fn validate_season_label(label: &str) -> Result<(), ConfigError> {
    let valid = label.len() == 7
        && label.as_bytes()[4] == b'-'
        && label[..4].chars().all(|c| c.is_ascii_digit())
        && label[5..].chars().all(|c| c.is_ascii_digit());

    if !valid {
        return Err(ConfigError::Validation(format!(
            "current-season must look like '2021-22', got '{}'",
            label
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_season_label() {
        assert!(validate_season_label("2021-22").is_ok());
        assert!(validate_season_label("1999-00").is_ok());

        assert!(validate_season_label("").is_err());
        assert!(validate_season_label("2021").is_err());
        assert!(validate_season_label("2021/22").is_err());
        assert!(validate_season_label("21-2022").is_err());
    }
}
