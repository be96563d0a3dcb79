//! Integration tests for the analysis pipeline
//!
//! Search → sanitize → analyze through `TicketAnalysisService`, plus the
//! engine's failure isolation with the built-in calculators.

mod support;

use std::sync::Arc;

use serde_json::{json, Value};
use support::auth::FakeHelper;
use support::remote::FakeRemote;
use support::{open_ticket, resolved_ticket};
use tixlens_common::auth::{AuthSession, AuthSessionConfig};
use tixlens_core::analysis::TeamVelocityCalculator;
use tixlens_core::{
    AnalysisEngine, CalculatorError, MetricsCalculator, ResilientServiceClient, Sanitizer,
    ServiceErrorKind, TicketAnalysisService,
};
use tixlens_domain::{AnalysisSettings, MetricMap, SearchCriteria, Severity, Ticket};

struct BrokenCalculator;

impl MetricsCalculator for BrokenCalculator {
    fn name(&self) -> &str {
        "broken"
    }

    fn names(&self) -> Vec<String> {
        vec!["broken.value".to_string()]
    }

    fn calculate(&self, _tickets: &[Ticket]) -> Result<MetricMap, CalculatorError> {
        Err(CalculatorError::InvalidInput("no tickets I like".to_string()))
    }
}

fn service(remote: FakeRemote) -> (TicketAnalysisService<FakeRemote>, Arc<FakeRemote>) {
    let remote = Arc::new(remote);
    let helper: Arc<FakeHelper> = Arc::new(FakeHelper::ok());
    let session = Arc::new(AuthSession::new(helper, AuthSessionConfig::default()));
    let client = ResilientServiceClient::builder(remote.clone(), session).build().expect("client");
    let sanitizer = Sanitizer::with_defaults().expect("sanitizer");
    let engine = AnalysisEngine::standard(&AnalysisSettings::default());
    (TicketAnalysisService::new(Arc::new(client), sanitizer, engine), remote)
}

/// Validates the engine on an empty ticket set.
///
/// # Test Steps
/// 1. Analyze an empty slice with the standard calculators
/// 2. Verify `ticket_count` is zero and nothing failed
/// 3. Verify every calculator produced its defined empty output
#[test]
fn test_empty_input_yields_every_empty_state() {
    let engine = AnalysisEngine::standard(&AnalysisSettings::default());

    let result = engine.analyze(&[]);

    assert_eq!(result.ticket_count, 0);
    assert!(result.is_complete());
    assert_eq!(result.metric("resolution_time.resolved_count"), Some(&json!(0)));
    assert_eq!(result.metric("resolution_time.avg_hours"), Some(&Value::Null));
    assert_eq!(result.metric("status_distribution.open_ratio"), Some(&Value::Null));
    assert_eq!(result.metric("sla.compliance_rate"), Some(&Value::Null));
    assert_eq!(result.metric("sla.breached_count"), Some(&json!(0)));
    assert_eq!(result.metric("velocity.avg_per_week"), Some(&json!(0.0)));
    assert_eq!(result.metrics.len(), 12);
}

/// Validates a failing calculator is recorded by name while the one after
/// it still contributes metrics.
#[test]
fn test_failing_calculator_isolated_from_successful_one() {
    let engine = AnalysisEngine::builder()
        .calculator(BrokenCalculator)
        .calculator(TeamVelocityCalculator)
        .build();
    let tickets = vec![resolved_ticket("INC1", Severity::High, 3).with_resolver_group("network")];

    let result = engine.analyze(&tickets);

    assert_eq!(result.errors, vec!["broken".to_string()]);
    assert_eq!(result.metric("velocity.by_group"), Some(&json!({"network": 1})));
    assert!(result.metric("broken.value").is_none());
}

/// Validates the full pipeline: sensitive values never reach the metrics
/// and the report counts what was replaced.
///
/// # Test Steps
/// 1. Serve three tickets, two containing contact details
/// 2. Run the analysis service
/// 3. Verify the redaction count and the computed metrics
#[tokio::test]
async fn test_run_sanitizes_then_analyzes() {
    let tickets = vec![
        open_ticket("INC1").with_description("call 555-123-4567"),
        resolved_ticket("INC2", Severity::Critical, 2).with_assignee("ana@corp.example"),
        resolved_ticket("INC3", Severity::Critical, 10),
    ];
    let (service, remote) = service(FakeRemote::new().with_tickets(tickets));

    let report = service.run(&SearchCriteria::default()).await.expect("report");

    assert_eq!(report.redactions, 2);
    assert_eq!(report.result.ticket_count, 3);
    assert!(report.result.is_complete());
    assert_eq!(report.result.metric("resolution_time.resolved_count"), Some(&json!(2)));
    assert_eq!(report.result.metric("sla.breached_count"), Some(&json!(1)));
    assert_eq!(report.result.metric("sla.compliance_rate"), Some(&json!(0.5)));
    assert_eq!(remote.calls(), 1);
}

/// Validates per-group fan-out merges tickets by id and searches each
/// distinct group once.
#[tokio::test]
async fn test_run_for_groups_merges_unique_tickets() {
    let shared = resolved_ticket("INC2", Severity::Low, 5).with_resolver_group("network");
    let remote = FakeRemote::new()
        .with_group("network", vec![resolved_ticket("INC1", Severity::Low, 1), shared.clone()])
        .with_group("desktop", vec![shared, open_ticket("INC3")]);
    let (service, remote) = service(remote);
    let groups = vec!["network".to_string(), "desktop".to_string(), " network ".to_string()];

    let report = service.run_for_groups(&SearchCriteria::default(), &groups).await.expect("report");

    assert_eq!(report.result.ticket_count, 3);
    assert_eq!(remote.calls(), 2);
    let mut searched: Vec<String> =
        remote.queries().into_iter().filter_map(|q| q.resolver_group).collect();
    searched.sort();
    assert_eq!(searched, vec!["desktop".to_string(), "network".to_string()]);
}

/// Validates a failing group search fails the whole run.
#[tokio::test]
async fn test_run_for_groups_propagates_search_failure() {
    let remote = FakeRemote::new()
        .with_group("network", vec![open_ticket("INC1")])
        .with_failing_group("ghosts");
    let (service, _remote) = service(remote);
    let groups = vec!["network".to_string(), "ghosts".to_string()];

    let err = service
        .run_for_groups(&SearchCriteria::default(), &groups)
        .await
        .expect_err("group failure");

    assert_eq!(err.kind(), ServiceErrorKind::RemoteRejected);
}

/// Validates an empty group list behaves like a plain run.
#[tokio::test]
async fn test_run_for_no_groups_is_plain_run() {
    let (service, remote) = service(FakeRemote::new().with_tickets(vec![open_ticket("INC1")]));

    let report = service.run_for_groups(&SearchCriteria::default(), &[]).await.expect("report");

    assert_eq!(report.result.ticket_count, 1);
    assert_eq!(remote.queries()[0].resolver_group, None);
}
