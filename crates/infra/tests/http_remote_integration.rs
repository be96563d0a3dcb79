//! Integration tests for the HTTP ticket service adapter
//!
//! Runs `ResilientServiceClient` over `HttpTicketRemote` against a wiremock
//! server, so status classification, retry, breaker and session handling
//! are exercised through real HTTP.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tixlens_common::auth::{AuthError, AuthSession, AuthSessionConfig, CredentialHelper, SessionExpiry};
use tixlens_common::resilience::{CircuitBreakerConfig, RetryConfig};
use tixlens_core::{ErrorLayer, ResilientServiceClient, ServiceErrorKind};
use tixlens_domain::{SearchCriteria, Severity, TicketStatus};
use tixlens_infra::HttpTicketRemote;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[derive(Default)]
struct CountingHelper {
    calls: AtomicUsize,
}

#[async_trait]
impl CredentialHelper for CountingHelper {
    async fn check_or_refresh(&self) -> Result<SessionExpiry, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(SessionExpiry::in_seconds(3_600))
    }
}

fn retry(max_attempts: u32) -> RetryConfig {
    RetryConfig::builder()
        .max_attempts(max_attempts)
        .base_delay(Duration::from_millis(5))
        .max_delay(Duration::from_millis(20))
        .jitter(false)
        .build()
        .expect("valid retry config")
}

fn client(
    server: &MockServer,
    max_attempts: u32,
) -> (ResilientServiceClient<HttpTicketRemote>, Arc<CountingHelper>) {
    let remote =
        Arc::new(HttpTicketRemote::new(&server.uri(), Duration::from_secs(2)).expect("remote"));
    let helper = Arc::new(CountingHelper::default());
    let session = Arc::new(AuthSession::new(helper.clone(), AuthSessionConfig::default()));
    let client = ResilientServiceClient::builder(remote, session)
        .retry_config(retry(max_attempts))
        .request_timeout(Duration::from_secs(2))
        .build()
        .expect("client");
    (client, helper)
}

fn wire_ticket(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "title": "Mailbox full",
        "status": status,
        "priority": "2",
        "createdAt": "2024-04-01T08:00:00Z",
        "resolvedAt": "2024-04-01T12:00:00Z",
        "assignmentGroup": "messaging"
    })
}

/// Validates the search request shape and response mapping.
///
/// # Test Steps
/// 1. Mount a search endpoint that only matches the normalized query
/// 2. Search with duplicate statuses and an oversized limit
/// 3. Verify the mapped tickets and a single authentication
#[tokio::test]
async fn test_search_posts_normalized_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tickets/search"))
        .and(body_partial_json(json!({
            "statuses": ["open", "resolved"],
            "resolverGroup": "messaging",
            "limit": 100
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tickets": [wire_ticket("INC1", "Resolved"), wire_ticket("INC2", "in progress")]
        })))
        .expect(1)
        .mount(&server)
        .await;
    let remote =
        Arc::new(HttpTicketRemote::new(&server.uri(), Duration::from_secs(2)).expect("remote"));
    let helper = Arc::new(CountingHelper::default());
    let session = Arc::new(AuthSession::new(helper.clone(), AuthSessionConfig::default()));
    let client = ResilientServiceClient::builder(remote, session)
        .max_results_ceiling(100)
        .build()
        .expect("client");

    let criteria = SearchCriteria::builder()
        .statuses([TicketStatus::Resolved, TicketStatus::Open, TicketStatus::Resolved])
        .resolver_group("messaging")
        .max_results(10_000)
        .build();
    let tickets = client.search_tickets(&criteria).await.expect("search");

    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0].severity, Severity::High);
    assert_eq!(tickets[0].status, TicketStatus::Resolved);
    assert_eq!(tickets[1].status, TicketStatus::InProgress);
    assert_eq!(tickets[0].resolver_group.as_deref(), Some("messaging"));
    assert_eq!(helper.calls.load(Ordering::SeqCst), 1);
}

/// Validates transient server errors are retried inside one call.
#[tokio::test]
async fn test_server_errors_are_retried_until_success() {
    let server = MockServer::start().await;
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_clone = attempts.clone();
    Mock::given(method("POST"))
        .and(path("/api/v1/tickets/search"))
        .respond_with(move |_req: &Request| -> ResponseTemplate {
            if attempts_clone.fetch_add(1, Ordering::SeqCst) < 2 {
                ResponseTemplate::new(503)
            } else {
                ResponseTemplate::new(200).set_body_json(json!([wire_ticket("INC1", "closed")]))
            }
        })
        .expect(3)
        .mount(&server)
        .await;
    let (client, _helper) = client(&server, 3);

    let tickets = client.search_tickets(&SearchCriteria::default()).await.expect("search");

    assert_eq!(tickets.len(), 1);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(client.breaker().metrics().consecutive_failures, 0);
}

/// Validates an HTTP 401 surfaces as an auth rejection and forces the next
/// call to re-authenticate.
#[tokio::test]
async fn test_unauthorized_invalidates_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tickets/search"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    let (client, helper) = client(&server, 3);

    let err = client.search_tickets(&SearchCriteria::default()).await.expect_err("denied");

    assert_eq!(err.kind(), ServiceErrorKind::AuthDenied);
    assert_eq!(err.layer(), ErrorLayer::Remote);
    assert_eq!(err.attempts(), 1);
    assert!(!client.session().is_authenticated());

    let _ = client.search_tickets(&SearchCriteria::default()).await;
    assert_eq!(helper.calls.load(Ordering::SeqCst), 2);
}

/// Validates single-ticket lookups, including the unknown-id case.
#[tokio::test]
async fn test_get_ticket_maps_not_found_to_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/tickets/INC7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(wire_ticket("INC7", "open")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/tickets/INC404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    let (client, _helper) = client(&server, 1);

    let found = client.get_ticket("INC7").await.expect("lookup");
    let missing = client.get_ticket("INC404").await.expect("lookup");

    assert_eq!(found.map(|t| t.id), Some("INC7".to_string()));
    assert!(missing.is_none());
}

/// Validates an undecodable body is a validation failure that is neither
/// retried nor held against the breaker.
#[tokio::test]
async fn test_malformed_body_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tickets/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .expect(1)
        .mount(&server)
        .await;
    let (client, _helper) = client(&server, 3);

    let err = client.search_tickets(&SearchCriteria::default()).await.expect_err("malformed");

    assert_eq!(err.kind(), ServiceErrorKind::Validation);
    assert_eq!(err.layer(), ErrorLayer::Remote);
    assert!(!err.message().contains("maintenance"));
    assert_eq!(client.breaker().metrics().consecutive_failures, 0);
}

/// Validates repeated outages open the breaker so later calls never reach
/// the server.
///
/// # Test Steps
/// 1. Serve 500 on every request with a breaker threshold of two
/// 2. Make two failing calls, then a third
/// 3. Verify the third is rejected by the breaker and the server saw two
#[tokio::test]
async fn test_outage_opens_breaker() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tickets/search"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    let remote =
        Arc::new(HttpTicketRemote::new(&server.uri(), Duration::from_secs(2)).expect("remote"));
    let helper = Arc::new(CountingHelper::default());
    let session = Arc::new(AuthSession::new(helper, AuthSessionConfig::default()));
    let breaker = CircuitBreakerConfig::builder()
        .failure_threshold(2)
        .open_duration(Duration::from_secs(60))
        .build()
        .expect("valid breaker config");
    let client = ResilientServiceClient::builder(remote, session)
        .breaker_config(breaker)
        .retry_config(retry(1))
        .build()
        .expect("client");

    for _ in 0..2 {
        let err = client.search_tickets(&SearchCriteria::default()).await.expect_err("outage");
        assert_eq!(err.kind(), ServiceErrorKind::Connection);
        assert_eq!(err.status(), Some(500));
    }
    let err = client.search_tickets(&SearchCriteria::default()).await.expect_err("open");

    assert_eq!(err.kind(), ServiceErrorKind::CircuitOpen);
    assert_eq!(err.layer(), ErrorLayer::Circuit);
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(2));
}

#[cfg(unix)]
#[tokio::test]
async fn test_process_helper_authenticates_real_calls() {
    use tixlens_infra::ProcessCredentialHelper;

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/tickets/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "tickets": [] })))
        .mount(&server)
        .await;
    let helper = ProcessCredentialHelper::new("sh", Duration::from_secs(5))
        .args(["-c".to_string(), "echo expires_in=900".to_string()]);
    let session = Arc::new(AuthSession::new(Arc::new(helper), AuthSessionConfig::default()));
    let remote =
        Arc::new(HttpTicketRemote::new(&server.uri(), Duration::from_secs(2)).expect("remote"));
    let client = ResilientServiceClient::builder(remote, session).build().expect("client");

    let tickets = client.search_tickets(&SearchCriteria::default()).await.expect("search");

    assert!(tickets.is_empty());
    let snapshot = client.session().snapshot().expect("session established");
    assert!(snapshot.valid);
    assert!(snapshot.seconds_until_expiry() > 800);
}
