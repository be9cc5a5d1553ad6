//! Reasoning-service boundary: timeouts, failures, determinism, concurrency cap

mod helpers;

use finres_engine::adjudication::FALLBACK_RATIONALE;
use finres_engine::types::{
    Fragment, MetricId, ResolutionMethod, ResolutionRequest, SectionType, UnresolvedReason,
};
use helpers::{cell, context_with, orchestrator, StubBehavior, StubReasoningService};
use std::time::Duration;

/// Two cash figures on the same balance-sheet page with equal confidence
fn tied_cash() -> Vec<Fragment> {
    vec![
        cell("bs-a", SectionType::BalanceSheet, 10, "Cash", "2023 £m", "50"),
        cell("bs-b", SectionType::BalanceSheet, 10, "Cash", "2023 £m", "58"),
    ]
}

#[tokio::test]
async fn test_tied_group_is_adjudicated() {
    let stub = StubReasoningService::new(StubBehavior::Select("bs-b:0".to_string()));
    let orch = orchestrator(context_with(|_| {}), Some(stub.clone()));

    let resolutions = orch.resolve_document(tied_cash()).await.unwrap();

    assert_eq!(stub.calls(), 1);
    let resolution = &resolutions[0];
    assert_eq!(resolution.method, ResolutionMethod::Adjudicated);
    assert_eq!(resolution.chosen_candidate.as_deref(), Some("bs-b:0"));
    assert_eq!(resolution.rationale, "stub selected bs-b:0");
}

#[tokio::test]
async fn test_reasoning_timeout_falls_back() {
    let stub = StubReasoningService::new(StubBehavior::Hang(Duration::from_secs(5)));
    let ctx = context_with(|config| config.adjudication.timeout_ms = 50);
    let orch = orchestrator(ctx, Some(stub.clone()));

    let resolutions = orch.resolve_document(tied_cash()).await.unwrap();

    let resolution = &resolutions[0];
    assert_eq!(resolution.method, ResolutionMethod::AdjudicatedFallback);
    assert_eq!(resolution.rationale, FALLBACK_RATIONALE);
    // Top-ranked contender: equal confidence and position, smallest id
    assert_eq!(resolution.chosen_candidate.as_deref(), Some("bs-a:0"));
    assert!(resolution.confidence.unwrap() < 1.0);
}

#[tokio::test]
async fn test_transport_failure_falls_back() {
    let stub = StubReasoningService::new(StubBehavior::Fail);
    let orch = orchestrator(context_with(|_| {}), Some(stub));

    let resolutions = orch.resolve_document(tied_cash()).await.unwrap();
    assert_eq!(resolutions[0].method, ResolutionMethod::AdjudicatedFallback);
}

#[tokio::test]
async fn test_no_service_uses_fallback() {
    let orch = orchestrator(context_with(|_| {}), None);

    let resolutions = orch.resolve_document(tied_cash()).await.unwrap();
    assert_eq!(resolutions[0].method, ResolutionMethod::AdjudicatedFallback);
    assert!(resolutions[0].is_resolved());
}

#[tokio::test]
async fn test_fallback_disabled_leaves_group_unresolved() {
    let stub = StubReasoningService::new(StubBehavior::Fail);
    let ctx = context_with(|config| config.adjudication.fallback_on_failure = false);
    let orch = orchestrator(ctx, Some(stub));

    let resolutions = orch.resolve_document(tied_cash()).await.unwrap();

    let resolution = &resolutions[0];
    assert_eq!(resolution.method, ResolutionMethod::Unresolved);
    assert_eq!(
        resolution.unresolved_reason,
        Some(UnresolvedReason::AdjudicationUnavailable)
    );
    assert_eq!(resolution.considered.len(), 2);
}

#[tokio::test]
async fn test_repeated_runs_give_identical_decisions() {
    let stub = StubReasoningService::new(StubBehavior::SelectFirst);
    let orch = orchestrator(context_with(|_| {}), Some(stub));

    let mut fragments = tied_cash();
    fragments.push(cell("is-1", SectionType::IncomeStatement, 4, "Revenue", "2023 £m", "512"));

    let first = orch
        .resolve(ResolutionRequest::new("doc", fragments.clone()))
        .await
        .unwrap();
    let second = orch
        .resolve(ResolutionRequest::new("doc", fragments))
        .await
        .unwrap();

    assert_ne!(first.run_id, second.run_id);
    let a: Vec<_> = first.resolutions.iter().map(|r| r.decision()).collect();
    let b: Vec<_> = second.resolutions.iter().map(|r| r.decision()).collect();
    assert_eq!(a, b);
    assert_eq!(first.candidates, second.candidates);
    assert_eq!(first.verdicts, second.verdicts);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reasoning_calls_are_capped() {
    let stub = StubReasoningService::new(StubBehavior::SlowFirst(Duration::from_millis(50)));
    let ctx = context_with(|config| {
        config.adjudication.max_concurrent = 2;
        config.pipeline.workers = 8;
    });
    let orch = orchestrator(ctx, Some(stub.clone()));

    let mut fragments = Vec::new();
    for (metric, row) in [
        ("cash", "Cash"),
        ("debt", "Total debt"),
        ("net", "Net debt"),
        ("equity", "Total equity"),
    ] {
        fragments.push(cell(
            &format!("{}-a", metric),
            SectionType::BalanceSheet,
            10,
            row,
            "2023 £m",
            "50",
        ));
        fragments.push(cell(
            &format!("{}-b", metric),
            SectionType::BalanceSheet,
            10,
            row,
            "2023 £m",
            "58",
        ));
    }

    let resolutions = orch.resolve_document(fragments).await.unwrap();

    assert_eq!(resolutions.len(), 4);
    assert!(resolutions
        .iter()
        .all(|r| r.method == ResolutionMethod::Adjudicated));
    assert_eq!(stub.calls(), 4);
    assert!(stub.max_in_flight() <= 2, "max in flight {}", stub.max_in_flight());

    let metrics: Vec<MetricId> = resolutions.iter().map(|r| r.metric).collect();
    assert_eq!(
        metrics,
        vec![MetricId::TotalDebt, MetricId::NetDebt, MetricId::Cash, MetricId::TotalEquity]
    );
}
