//! Quote Flow Integration Tests
//!
//! Drives the typed aggregator client end to end against a wiremock
//! upstream:
//! - Lazy service authentication: the first call goes out tokenless, the
//!   resulting 401 triggers exactly one login, and the replay carries the
//!   fresh bearer
//! - Create-then-poll lifecycle with monotonic plan merging across
//!   snapshots
//! - Poll abort on fetch failure, before any callback fires
//! - The bounded 401 refresh/replay cycle surfacing `Unauthorized`

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use aggregator_gateway::{
    AggregatorClient, AggregatorHttpClient, AggregatorSettings, FieldValue, GatewayError,
    PollError, PollerSettings, QuotePoller, ServiceCredentials, TokenStore,
};

/// Typed client against the given mock upstream, with an empty token store.
fn make_client(server: &MockServer) -> AggregatorClient {
    let credentials = ServiceCredentials::new(
        "svc-user".to_string(),
        "svc-pass".to_string(),
        "CH-7".to_string(),
    );
    let settings = AggregatorSettings::new(server.uri(), credentials);
    let http = AggregatorHttpClient::new(settings, TokenStore::new()).unwrap();

    AggregatorClient::new(http)
}

/// Mount the service login endpoint issuing the given token.
async fn mount_login(server: &MockServer, token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/api/v1/user/verify-password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": token})))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Quote snapshot body carrying the given plan ids.
fn snapshot_body(quote_id: &str, plan_ids: &[u64]) -> Value {
    let plans: Vec<Value> = plan_ids
        .iter()
        .map(|id| {
            json!({
                "planId": id,
                "insurerName": format!("Insurer {id}"),
                "planName": format!("Plan {id}"),
                "premium": 10_000 + id,
                "coverAmount": 5_000_000,
            })
        })
        .collect();

    json!({"quoteId": quote_id, "plans": plans})
}

#[tokio::test]
async fn quote_lifecycle_authenticates_lazily_and_merges_snapshots() {
    let server = MockServer::start().await;
    mount_login(&server, "svc-abc", 1).await;

    // The first create attempt carries no token and gets refused once.
    Mock::given(method("POST"))
        .and(path("/api/v1/quotes"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "missing token"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/v1/quotes"))
        .and(header("authorization", "Bearer svc-abc"))
        .and(body_json(json!({
            "fieldValues": [{"name": "pincode", "value": "110001"}],
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body("Q-77", &[])))
        .expect(1)
        .mount(&server)
        .await;

    // Snapshots grow across fetches, with one transient omission of plan 1.
    Mock::given(method("GET"))
        .and(path("/api/v1/quotes/Q-77"))
        .and(header("authorization", "Bearer svc-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body("Q-77", &[1])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/quotes/Q-77"))
        .and(header("authorization", "Bearer svc-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body("Q-77", &[2])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/quotes/Q-77"))
        .and(header("authorization", "Bearer svc-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_body("Q-77", &[2, 3])))
        .mount(&server)
        .await;

    let client = Arc::new(make_client(&server));

    let quote = client
        .create_quote(vec![FieldValue {
            name: "pincode".to_string(),
            value: json!("110001"),
        }])
        .await
        .unwrap();
    assert_eq!(quote.id, "Q-77");
    assert!(quote.plans.is_empty());

    let poller = QuotePoller::new(
        Arc::clone(&client),
        PollerSettings::default()
            .with_max_attempts(3)
            .with_interval(Duration::from_millis(10)),
    );

    let cancel = CancellationToken::new();
    let mut plan_counts = Vec::new();
    let final_quote = poller
        .poll_quote(
            "Q-77",
            |snapshot| plan_counts.push(snapshot.plans.len()),
            &cancel,
        )
        .await
        .unwrap();

    // The caller's view only ever grows, even across the omission.
    assert_eq!(plan_counts, vec![1, 2, 3]);

    let mut ids: Vec<u64> = final_quote.plans.iter().map(|plan| plan.id).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn poll_rejects_on_fetch_failure_without_invoking_callback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/quotes/Q-1"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "backend down"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = make_client(&server);
    client.http().tokens().store("tok-1");

    let poller = QuotePoller::new(
        Arc::new(client),
        PollerSettings::default()
            .with_max_attempts(5)
            .with_interval(Duration::from_millis(10)),
    );

    let cancel = CancellationToken::new();
    let mut callbacks = 0_u32;
    let err = poller
        .poll_quote("Q-1", |_| callbacks += 1, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, PollError::Fetch { attempt: 1, .. }));
    assert_eq!(callbacks, 0);
}

#[tokio::test]
async fn bounded_refresh_surfaces_unauthorized_through_typed_ops() {
    let server = MockServer::start().await;
    mount_login(&server, "svc-abc", 3).await;

    // Even a fresh token keeps getting refused.
    Mock::given(method("POST"))
        .and(path("/api/v1/quotes"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "token revoked"})))
        .expect(4)
        .mount(&server)
        .await;

    let client = make_client(&server);
    let err = client
        .create_quote(vec![FieldValue {
            name: "pincode".to_string(),
            value: json!("110001"),
        }])
        .await
        .unwrap_err();

    match err {
        GatewayError::Unauthorized { message } => assert_eq!(message, "token revoked"),
        other => panic!("unexpected error: {other:?}"),
    }
}
