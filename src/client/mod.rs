//! Blocking HTTP fetch primitive
//!
//! One fetch is: a random pre-request delay (staying under the upstream's
//! implicit rate limit), then a single GET with the fixed header set the
//! upstream requires, bounded by a hard timeout. Retry policy lives in
//! [`fetch_with_retry`]; everything else returns after one attempt.
//!
//! Failures are split into two kinds so callers can branch on the kind
//! rather than on error identity: [`FetchError::Transient`] is worth
//! retrying, [`FetchError::Permanent`] is not.

use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ORIGIN, REFERER};
use std::time::Duration;
use thiserror::Error;

/// How many times a transiently-failing fetch is attempted before the
/// entity is skipped. Attempt 3 failing means no attempt 4.
pub const RETRY_CAP: u32 = 3;

/// Errors from the fetch primitive, classified by retryability
#[derive(Debug, Error)]
pub enum FetchError {
    /// Timeout or IO-level failure; safe and worthwhile to retry
    #[error("transient fetch failure for {url}: {message}")]
    Transient { url: String, message: String },

    /// The upstream answered but the answer is unusable; retrying won't help
    #[error("permanent fetch failure for {url}: {message}")]
    Permanent { url: String, message: String },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[from] reqwest::Error),
}

impl FetchError {
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. })
    }
}

/// Builds the blocking HTTP client with the upstream's required headers
///
/// The upstream rejects requests that do not present a browser-like
/// Origin/Referer pair, so those are baked into every request.
pub fn build_client(origin: &str, timeout: Duration) -> Result<Client, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    if let Ok(value) = HeaderValue::from_str(origin) {
        headers.insert(ORIGIN, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{}/", origin)) {
        headers.insert(REFERER, value);
    }
    headers.insert(
        "Access-Control-Request-Headers",
        HeaderValue::from_static("x-nba-stats-origin,x-nba-stats-token"),
    );
    headers.insert(
        "Access-Control-Request-Method",
        HeaderValue::from_static("GET"),
    );

    Ok(Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()?)
}

/// Fetches a URL once, after a random delay of up to `jitter_cap`
///
/// # Returns
///
/// * `Ok(String)` - The response body
/// * `Err(FetchError)` - Classified as transient or permanent
pub fn fetch_once(client: &Client, url: &str, jitter_cap: Duration) -> Result<String, FetchError> {
    if !jitter_cap.is_zero() {
        let pause = rand::thread_rng().gen_range(Duration::ZERO..jitter_cap);
        std::thread::sleep(pause);
    }

    tracing::debug!("Fetching {}", url);

    let response = client.get(url).send().map_err(|e| classify(url, e))?;
    let status = response.status();

    if !status.is_success() {
        // Throttling and server-side hiccups clear up; client errors don't
        let message = format!("HTTP {}", status.as_u16());
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(FetchError::Transient {
                url: url.to_string(),
                message,
            });
        }
        return Err(FetchError::Permanent {
            url: url.to_string(),
            message,
        });
    }

    response.text().map_err(|e| classify(url, e))
}

/// Fetches a URL, retrying transient failures up to [`RETRY_CAP`] attempts
///
/// The fetch primitive's own jitter provides the backoff between attempts.
/// Permanent failures are returned immediately.
pub fn fetch_with_retry(
    client: &Client,
    url: &str,
    jitter_cap: Duration,
) -> Result<String, FetchError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match fetch_once(client, url, jitter_cap) {
            Ok(body) => return Ok(body),
            Err(e) if e.is_transient() && attempt < RETRY_CAP => {
                tracing::warn!("Attempt {} failed for {}: {}. Retrying", attempt, url, e);
            }
            Err(e) => return Err(e),
        }
    }
}

fn classify(url: &str, error: reqwest::Error) -> FetchError {
    let message = error.to_string();
    if error.is_timeout() || error.is_connect() || error.is_request() || error.is_body() {
        FetchError::Transient {
            url: url.to_string(),
            message,
        }
    } else {
        FetchError::Permanent {
            url: url.to_string(),
            message,
        }
    }
}

/// Builds the player profile URL for one player id
pub fn profile_url(stats_base: &str, player_id: i64) -> String {
    format!(
        "{}/playerprofilev2?LeagueID=00&PerMode=PerGame&PlayerID={}",
        stats_base, player_id
    )
}

/// Builds the shot chart URL for one player, season, and season type
///
/// The long tail of empty parameters is required verbatim by the upstream.
pub fn shot_chart_url(
    stats_base: &str,
    season: &str,
    player_id: i64,
    season_type_param: &str,
) -> String {
    format!(
        "{}/shotchartdetail?AheadBehind=&CFID=33&CFPARAMS={}&ClutchTime=&Conference=&ContextFilter=\
         &ContextMeasure=FGA&DateFrom=&DateTo=&Division=&EndPeriod=10&EndRange=28800&GROUP_ID=\
         &GameEventID=&GameID=&GameSegment=&GroupID=&GroupMode=&GroupQuantity=5&LastNGames=0\
         &LeagueID=00&Location=&Month=0&OnOff=&OpponentTeamID=0&Outcome=&PORound=0&Period=0\
         &PlayerID={}&PlayerID1=&PlayerID2=&PlayerID3=&PlayerID4=&PlayerID5=&PlayerPosition=\
         &PointDiff=&Position=&RangeType=0&RookieYear=&Season=&SeasonSegment=&SeasonType={}\
         &ShotClockRange=&StartPeriod=1&StartRange=0&StarterBench=&TeamID=0&VsConference=\
         &VsDivision=&VsPlayerID1=&VsPlayerID2=&VsPlayerID3=&VsPlayerID4=&VsPlayerID5=&VsTeamID=",
        stats_base, season, player_id, season_type_param
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_client() {
        let client = build_client("https://www.nba.com", Duration::from_secs(30));
        assert!(client.is_ok());
    }

    #[test]
    fn test_profile_url_carries_player_id() {
        let url = profile_url("https://stats.example.com/stats", 203076);
        assert!(url.contains("PlayerID=203076"));
        assert!(url.starts_with("https://stats.example.com/stats/playerprofilev2"));
    }

    #[test]
    fn test_shot_chart_url_parameters() {
        let url = shot_chart_url("https://stats.example.com/stats", "2015-16", 42, "Pre+Season");
        assert!(url.contains("CFPARAMS=2015-16"));
        assert!(url.contains("PlayerID=42&"));
        assert!(url.contains("SeasonType=Pre+Season"));
    }
}
