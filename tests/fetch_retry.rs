//! Retry behavior of the fetch primitive against a mock upstream
//!
//! The mock server runs on a manually-driven tokio runtime; the client under
//! test is blocking, exactly as the worker threads use it.

use shotledger::client::{build_client, fetch_with_retry, FetchError};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn start_server(rt: &tokio::runtime::Runtime) -> MockServer {
    rt.block_on(MockServer::start())
}

#[test]
fn transient_failure_is_attempted_exactly_three_times() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = start_server(&rt);

    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/always-broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server),
    );

    let client = build_client("https://www.nba.com", Duration::from_secs(5)).unwrap();
    let url = format!("{}/always-broken", server.uri());
    let result = fetch_with_retry(&client, &url, Duration::ZERO);

    assert!(matches!(result, Err(FetchError::Transient { .. })));

    // Exactly three attempts reached the upstream, never a fourth
    let requests = rt.block_on(server.received_requests()).unwrap();
    assert_eq!(requests.len(), 3);
}

#[test]
fn timeout_is_classified_transient_and_capped() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = start_server(&rt);

    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server),
    );

    // Client timeout far below the response delay: every attempt times out
    let client = build_client("https://www.nba.com", Duration::from_millis(250)).unwrap();
    let url = format!("{}/slow", server.uri());
    let result = fetch_with_retry(&client, &url, Duration::ZERO);

    assert!(matches!(result, Err(FetchError::Transient { .. })));
    let requests = rt.block_on(server.received_requests()).unwrap();
    assert_eq!(requests.len(), 3);
}

#[test]
fn permanent_failure_is_not_retried() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = start_server(&rt);

    rt.block_on(
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server),
    );

    let client = build_client("https://www.nba.com", Duration::from_secs(5)).unwrap();
    let url = format!("{}/gone", server.uri());
    let result = fetch_with_retry(&client, &url, Duration::ZERO);

    assert!(matches!(result, Err(FetchError::Permanent { .. })));
    let requests = rt.block_on(server.received_requests()).unwrap();
    assert_eq!(requests.len(), 1);
}

#[test]
fn success_after_transient_failures_returns_the_body() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = start_server(&rt);

    rt.block_on(async {
        // Two broken responses, then a good one
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;
    });

    let client = build_client("https://www.nba.com", Duration::from_secs(5)).unwrap();
    let url = format!("{}/flaky", server.uri());
    let body = fetch_with_retry(&client, &url, Duration::ZERO).unwrap();

    assert_eq!(body, "recovered");
}
