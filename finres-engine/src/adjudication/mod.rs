// Adjudicator - Choose One Value From the Candidates That Survived Validation
//
// Survivors are collapsed into clusters of agreeing values first. Ladder over
// the cluster representatives, ranked by their own confidence:
//   1. one cluster                                  -> auto-unique
//   2. confidence gap to the runner-up >= margin    -> auto-ranked
//   3. only one close contender from a primary statement -> rule-tiebreak
//   4. only one close contender reported latest     -> rule-tiebreak
//   5. reasoning service                            -> adjudicated
// A failed reasoning call falls back to the top-ranked contender.

pub mod http_client;
pub mod reasoning;

pub use http_client::HttpReasoningClient;
pub use reasoning::{
    parse_reasoning_reply, AdjudicationRequest, CandidateBrief, ReasoningReply, ReasoningService,
};

use crate::config::AdjudicationConfig;
use crate::context::ResolutionContext;
use crate::error::ReasoningError;
use crate::types::{
    Candidate, Confidence, DocumentPosition, MetricId, PeriodSpec, Resolution, ResolutionMethod,
    UnresolvedReason, Verdict,
};
use crate::validators::cluster_by_value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Rationale recorded on every fallback decision
pub const FALLBACK_RATIONALE: &str = "automated fallback: adjudication unavailable";

/// Absorbs float noise in the gap test (0.9 - 0.75 is not exactly 0.15)
const GAP_EPSILON: f64 = 1e-9;

/// Bayesian update formula
///
/// # Arguments
/// * `prior` - Prior confidence (0.0-1.0)
/// * `evidence` - New evidence confidence (0.0-1.0)
///
/// # Returns
/// * Posterior confidence (0.0-1.0)
pub fn bayesian_update(prior: Confidence, evidence: Confidence) -> Confidence {
    1.0 - (1.0 - prior) * (1.0 - evidence)
}

/// One cluster of agreeing survivors
#[derive(Debug)]
struct Contender<'c> {
    representative: &'c Candidate,
    members: Vec<&'c Candidate>,

    /// Member confidences combined with `bayesian_update`; stated on the
    /// Resolution, never used for ranking
    corroborated: Confidence,
}

impl<'c> Contender<'c> {
    fn from_cluster(mut members: Vec<&'c Candidate>) -> Option<Self> {
        // Highest confidence, then latest position, then smallest id
        members.sort_by(|a, b| {
            b.confidence()
                .total_cmp(&a.confidence())
                .then_with(|| b.position().cmp(&a.position()))
                .then_with(|| a.id().cmp(b.id()))
        });
        let representative = *members.first()?;
        let corroborated = members
            .iter()
            .map(|c| c.confidence())
            .fold(0.0, bayesian_update);

        Some(Self {
            representative,
            members,
            corroborated,
        })
    }

    /// Ranking score: the best single confidence in the cluster
    fn score(&self) -> Confidence {
        self.representative.confidence()
    }

    fn from_primary_statement(&self) -> bool {
        self.members.iter().any(|c| c.section().is_primary_statement())
    }

    fn latest_position(&self) -> DocumentPosition {
        self.members
            .iter()
            .map(|c| c.position())
            .max()
            .unwrap_or_else(|| self.representative.position())
    }
}

/// Conflict resolution for one (metric, period) group at a time
///
/// Clones share the reasoning service and the call permits.
#[derive(Clone)]
pub struct Adjudicator {
    config: AdjudicationConfig,
    unit_tolerance: f64,
    service: Option<Arc<dyn ReasoningService>>,
    permits: Arc<Semaphore>,
}

impl Adjudicator {
    /// # Arguments
    /// * `config` - Margin, timeout, concurrency cap and fallback policy
    /// * `unit_tolerance` - Relative tolerance for treating two values as equal
    /// * `service` - Reasoning service; None makes step 5 always unavailable
    pub fn new(
        config: AdjudicationConfig,
        unit_tolerance: f64,
        service: Option<Arc<dyn ReasoningService>>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Self {
            config,
            unit_tolerance,
            service,
            permits,
        }
    }

    pub fn from_context(
        ctx: &ResolutionContext,
        service: Option<Arc<dyn ReasoningService>>,
    ) -> Self {
        Self::new(ctx.adjudication.clone(), ctx.validation.unit_tolerance, service)
    }

    pub fn has_service(&self) -> bool {
        self.service.is_some()
    }

    /// Resolve one group
    ///
    /// # Arguments
    /// * `metric` / `period` - Group key
    /// * `group` - Every candidate of the group (recorded as considered)
    /// * `survivors` - Candidates without a `fail` verdict
    /// * `verdicts` - All verdicts of the group; warnings are forwarded to the reasoning call
    ///
    /// # Returns
    /// * A terminal Resolution; never an error
    pub async fn adjudicate(
        &self,
        metric: MetricId,
        period: &PeriodSpec,
        group: &[Candidate],
        survivors: &[&Candidate],
        verdicts: &[Verdict],
    ) -> Resolution {
        let considered: Vec<String> = group.iter().map(|c| c.id().to_string()).collect();

        if survivors.is_empty() {
            let reason = if group.is_empty() {
                UnresolvedReason::NoCandidates
            } else {
                UnresolvedReason::AllFailedValidation
            };
            debug!("{} {}: {}", metric, period, reason.describe());
            return Resolution::unresolved(
                metric,
                Some(period.clone()),
                reason,
                reason.describe(),
                considered,
            );
        }

        let mut contenders: Vec<Contender<'_>> =
            cluster_by_value(survivors.iter().copied(), self.unit_tolerance)
                .into_iter()
                .filter_map(Contender::from_cluster)
                .collect();
        contenders.sort_by(|a, b| {
            b.score()
                .total_cmp(&a.score())
                .then_with(|| b.latest_position().cmp(&a.latest_position()))
                .then_with(|| a.representative.id().cmp(b.representative.id()))
        });

        let Some(top) = contenders.first() else {
            return Resolution::unresolved(
                metric,
                Some(period.clone()),
                UnresolvedReason::AllFailedValidation,
                UnresolvedReason::AllFailedValidation.describe(),
                considered,
            );
        };

        // Step 1: everything agrees
        if contenders.len() == 1 {
            let rationale = if top.members.len() == 1 {
                "Single valid candidate".to_string()
            } else {
                format!(
                    "{} candidates agree after normalization ({})",
                    top.members.len(),
                    top.members
                        .iter()
                        .map(|c| c.id())
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            };
            return Resolution::chosen(
                top.representative,
                top.corroborated,
                ResolutionMethod::AutoUnique,
                rationale,
                considered,
            );
        }

        // Step 2: clear confidence lead
        let runner_up = &contenders[1];
        let margin = self.config.confidence_margin;
        if top.score() - runner_up.score() + GAP_EPSILON >= margin {
            return Resolution::chosen(
                top.representative,
                top.corroborated,
                ResolutionMethod::AutoRanked,
                format!(
                    "Confidence {:.2} leads next candidate {} ({:.2}) by at least {:.2}",
                    top.score(),
                    runner_up.representative.id(),
                    runner_up.score(),
                    margin
                ),
                considered,
            );
        }

        let close: Vec<&Contender<'_>> = contenders
            .iter()
            .filter(|c| top.score() - c.score() + GAP_EPSILON < margin)
            .collect();

        // Step 3: primary statements outrank notes and narrative
        let primary: Vec<&Contender<'_>> = close
            .iter()
            .copied()
            .filter(|c| c.from_primary_statement())
            .collect();
        if primary.len() == 1 {
            let chosen = primary[0];
            return Resolution::chosen(
                chosen.representative,
                chosen.corroborated,
                ResolutionMethod::RuleTiebreak,
                format!(
                    "Only close contender reported in a primary financial statement ({})",
                    chosen.representative.provenance()
                ),
                considered,
            );
        }
        let pool = if primary.is_empty() { close } else { primary };

        // Step 4: most recently reported
        let latest = pool.iter().map(|c| c.latest_position()).max();
        let at_latest: Vec<&Contender<'_>> = pool
            .iter()
            .copied()
            .filter(|c| Some(c.latest_position()) == latest)
            .collect();
        if at_latest.len() == 1 {
            let chosen = at_latest[0];
            let position = chosen.latest_position();
            return Resolution::chosen(
                chosen.representative,
                chosen.corroborated,
                ResolutionMethod::RuleTiebreak,
                format!(
                    "Most recently reported contender (page {}, section order {})",
                    position.page, position.section_rank
                ),
                considered,
            );
        }

        // Step 5: external reasoning
        let request = AdjudicationRequest {
            metric,
            period: period.to_string(),
            candidates: contenders
                .iter()
                .map(|c| CandidateBrief::from_candidate(c.representative, verdicts))
                .collect(),
        };

        let selection = self.call_service(&request).await.and_then(|reply| {
            contenders
                .iter()
                .find(|c| c.representative.id() == reply.selected_candidate_id)
                .map(|chosen| (chosen, reply))
                .ok_or_else(|| ReasoningError::Malformed("selection not offered".to_string()))
        });

        match selection {
            Ok((chosen, reply)) => {
                info!(
                    "{} {}: adjudicated {} among {} contenders",
                    metric,
                    period,
                    chosen.representative.id(),
                    contenders.len()
                );
                Resolution::chosen(
                    chosen.representative,
                    chosen.corroborated,
                    ResolutionMethod::Adjudicated,
                    reply.rationale,
                    considered,
                )
            }
            Err(err) => self.fallback(metric, period, top, considered, &err),
        }
    }

    async fn call_service(
        &self,
        request: &AdjudicationRequest,
    ) -> Result<ReasoningReply, ReasoningError> {
        let service = self.service.as_ref().ok_or(ReasoningError::Unavailable)?;

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| ReasoningError::Unavailable)?;

        debug!(
            "{} {}: asking {} service to choose among {} candidates",
            request.metric,
            request.period,
            service.name(),
            request.candidates.len()
        );

        let timeout_ms = self.config.timeout_ms;
        let reply = tokio::time::timeout(
            Duration::from_millis(timeout_ms),
            service.adjudicate(request),
        )
        .await
        .map_err(|_| ReasoningError::Timeout(timeout_ms))??;

        reply.validate(request)?;
        Ok(reply)
    }

    fn fallback(
        &self,
        metric: MetricId,
        period: &PeriodSpec,
        top: &Contender<'_>,
        considered: Vec<String>,
        err: &ReasoningError,
    ) -> Resolution {
        if !self.config.fallback_on_failure {
            warn!("{} {}: {}; left unresolved", metric, period, err);
            return Resolution::unresolved(
                metric,
                Some(period.clone()),
                UnresolvedReason::AdjudicationUnavailable,
                format!("{} ({})", UnresolvedReason::AdjudicationUnavailable.describe(), err),
                considered,
            );
        }

        warn!(
            "{} {}: {}; falling back to top-ranked candidate {}",
            metric,
            period,
            err,
            top.representative.id()
        );
        Resolution::chosen(
            top.representative,
            top.corroborated * self.config.fallback_confidence_penalty,
            ResolutionMethod::AdjudicatedFallback,
            FALLBACK_RATIONALE,
            considered,
        )
    }
}
