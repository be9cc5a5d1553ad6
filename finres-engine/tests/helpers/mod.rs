//! Test Helper Utilities
//!
//! Fragment builders and a scripted reasoning service shared by the
//! finres-engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use finres_engine::adjudication::{AdjudicationRequest, ReasoningReply, ReasoningService};
use finres_engine::config::EngineConfig;
use finres_engine::types::{Fragment, FragmentContext, FragmentKind, SectionType};
use finres_engine::{ReasoningError, ResolutionContext, ResolutionOrchestrator};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Table cell with a row label and a period/unit column label
pub fn cell(
    id: &str,
    section: SectionType,
    page: u32,
    row: &str,
    column: &str,
    raw: &str,
) -> Fragment {
    Fragment {
        id: id.to_string(),
        kind: FragmentKind::TableCell,
        raw_text: raw.to_string(),
        value: None,
        page,
        section,
        context: FragmentContext {
            header: None,
            row_label: Some(row.to_string()),
            column_label: Some(column.to_string()),
            unit_hint: None,
        },
    }
}

/// Prose fragment
pub fn text(id: &str, section: SectionType, page: u32, body: &str) -> Fragment {
    Fragment {
        id: id.to_string(),
        kind: FragmentKind::Text,
        raw_text: body.to_string(),
        value: None,
        page,
        section,
        context: FragmentContext::default(),
    }
}

/// Context built from the default configuration after `tweak`
pub fn context_with(tweak: impl FnOnce(&mut EngineConfig)) -> Arc<ResolutionContext> {
    let mut config = EngineConfig::default();
    tweak(&mut config);
    Arc::new(ResolutionContext::from_config(&config).expect("valid test configuration"))
}

pub fn orchestrator(
    ctx: Arc<ResolutionContext>,
    service: Option<Arc<StubReasoningService>>,
) -> ResolutionOrchestrator {
    let service = service.map(|s| s as Arc<dyn ReasoningService>);
    ResolutionOrchestrator::new(ctx, service)
}

/// Scripted behaviour of the stub
#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// Select this candidate id
    Select(String),
    /// Select the first presented candidate
    SelectFirst,
    /// Never answer within any sensible timeout
    Hang(Duration),
    /// Answer with a transport failure
    Fail,
    /// Select the first candidate after a delay
    SlowFirst(Duration),
}

/// Deterministic ReasoningService for tests
pub struct StubReasoningService {
    behavior: StubBehavior,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubReasoningService {
    pub fn new(behavior: StubBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn reply(id: &str) -> ReasoningReply {
        ReasoningReply {
            selected_candidate_id: id.to_string(),
            rationale: format!("stub selected {}", id),
            confidence: Some(0.8),
            flags: Vec::new(),
        }
    }
}

#[async_trait]
impl ReasoningService for StubReasoningService {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn adjudicate(
        &self,
        request: &AdjudicationRequest,
    ) -> Result<ReasoningReply, ReasoningError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let first = request
            .candidates
            .first()
            .map(|c| c.id.clone())
            .unwrap_or_default();

        let result = match &self.behavior {
            StubBehavior::Select(id) => Ok(Self::reply(id)),
            StubBehavior::SelectFirst => Ok(Self::reply(&first)),
            StubBehavior::Hang(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(Self::reply(&first))
            }
            StubBehavior::Fail => Err(ReasoningError::Transport("connection refused".to_string())),
            StubBehavior::SlowFirst(duration) => {
                tokio::time::sleep(*duration).await;
                Ok(Self::reply(&first))
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
