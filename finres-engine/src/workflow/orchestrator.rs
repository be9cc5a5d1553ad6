// Resolution Orchestrator - One Document, End to End
//
// Tiers run in sequence; metrics within a tier run as independent tasks on a
// bounded pool. Each metric task walks its periods oldest first so that the
// year-over-year rule sees the prior period's resolved value.

use crate::adjudication::{Adjudicator, ReasoningService};
use crate::candidates::CandidateGenerator;
use crate::context::ResolutionContext;
use crate::error::{ResolveError, Result};
use crate::types::{
    Candidate, DocumentDefaults, Fragment, MetricId, PeriodKey, PeriodSpec, Resolution,
    ResolutionRequest, ResolvedLedger, UnresolvedReason, Verdict,
};
use crate::validators::{self, RuleInputs, ValidationSummary};
use crate::workflow::derived::{derive_metrics, DerivedMetric};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Candidates of one metric, grouped by period (oldest first)
type MetricGroups = BTreeMap<PeriodKey, Vec<Candidate>>;

/// Everything produced for one document
#[derive(Debug, Clone, Serialize)]
pub struct DocumentResolution {
    pub document_id: String,
    pub run_id: Uuid,

    /// Registry order, then period
    pub resolutions: Vec<Resolution>,

    pub candidates: Vec<Candidate>,
    pub verdicts: Vec<Verdict>,
    pub summary: ValidationSummary,
}

impl DocumentResolution {
    pub fn candidate(&self, id: &str) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id() == id)
    }

    /// Candidate selected by `resolution`, if any
    pub fn chosen(&self, resolution: &Resolution) -> Option<&Candidate> {
        resolution
            .chosen_candidate
            .as_deref()
            .and_then(|id| self.candidate(id))
    }

    pub fn verdicts_for(&self, candidate_id: &str) -> Vec<&Verdict> {
        self.verdicts
            .iter()
            .filter(|v| v.candidate_id == candidate_id)
            .collect()
    }

    /// Source fragment identifiers behind a resolution (empty when unresolved)
    pub fn fragments_for(&self, resolution: &Resolution) -> &[String] {
        self.chosen(resolution)
            .map(|c| c.fragment_ids())
            .unwrap_or(&[])
    }

    pub fn resolution(&self, metric: MetricId, period: Option<PeriodKey>) -> Option<&Resolution> {
        self.resolutions
            .iter()
            .find(|r| r.metric == metric && r.period.as_ref().map(PeriodSpec::key) == period)
    }

    pub fn unresolved(&self) -> impl Iterator<Item = &Resolution> {
        self.resolutions.iter().filter(|r| !r.is_resolved())
    }

    pub fn resolved_count(&self) -> usize {
        self.resolutions.iter().filter(|r| r.is_resolved()).count()
    }

    /// Growth rates and ratios computed from the resolved values
    pub fn derived_metrics(&self) -> Vec<DerivedMetric> {
        derive_metrics(&self.resolutions)
    }
}

/// Output of one metric task
struct MetricOutcome {
    resolutions: Vec<Resolution>,
    verdicts: Vec<Verdict>,
    candidates: Vec<Candidate>,
}

/// Runs resolution for whole documents
pub struct ResolutionOrchestrator {
    ctx: Arc<ResolutionContext>,
    adjudicator: Adjudicator,
}

impl ResolutionOrchestrator {
    /// # Arguments
    /// * `ctx` - Shared read-only context
    /// * `service` - Reasoning service for the last adjudication step (None to disable)
    pub fn new(ctx: Arc<ResolutionContext>, service: Option<Arc<dyn ReasoningService>>) -> Self {
        let adjudicator = Adjudicator::from_context(&ctx, service);
        debug!(
            "Orchestrator ready: {} workers, reasoning service {}",
            ctx.workers,
            if adjudicator.has_service() { "configured" } else { "absent" }
        );
        Self { ctx, adjudicator }
    }

    pub fn context(&self) -> &ResolutionContext {
        &self.ctx
    }

    /// Resolve every metric found in `fragments` using the configured defaults
    pub async fn resolve_document(&self, fragments: Vec<Fragment>) -> Result<Vec<Resolution>> {
        let request = ResolutionRequest::new(Uuid::new_v4().to_string(), fragments);
        Ok(self.resolve(request).await?.resolutions)
    }

    /// Resolve one document
    ///
    /// # Returns
    /// * `EmptyDocument` when the request has no fragments
    /// * Otherwise one Resolution per (metric, period) group, plus unresolved
    ///   records for target metrics that produced no candidates
    pub async fn resolve(&self, request: ResolutionRequest) -> Result<DocumentResolution> {
        let ResolutionRequest {
            document_id,
            fragments,
            target_metrics,
            defaults,
        } = request;

        if fragments.is_empty() {
            return Err(ResolveError::EmptyDocument(document_id));
        }

        let run_id = Uuid::new_v4();
        info!(
            "Resolving document {} (run {}): {} fragments",
            document_id,
            run_id,
            fragments.len()
        );

        let targets = target_metrics.map(|targets| self.known_targets(targets));
        let defaults = merge_defaults(defaults.as_ref(), &self.ctx.defaults);

        let candidates = CandidateGenerator::new(&self.ctx).generate_with_defaults(
            &fragments,
            targets.as_deref(),
            &defaults,
        );

        let observed = observed_periods(&candidates);
        let mut groups = group_candidates(candidates);

        let mut ledger = Arc::new(ResolvedLedger::new());
        let mut resolutions = Vec::new();
        let mut verdicts = Vec::new();
        let mut all_candidates = Vec::new();

        for (tier_index, tier) in self.ctx.registry.dependency_tiers().iter().enumerate() {
            let work: Vec<(MetricId, MetricGroups)> = tier
                .iter()
                .filter_map(|metric| groups.remove(metric).map(|g| (*metric, g)))
                .collect();
            if work.is_empty() {
                continue;
            }

            debug!("Tier {}: {} metrics", tier_index, work.len());

            let outcomes: Vec<Result<MetricOutcome>> = stream::iter(work)
                .map(|(metric, metric_groups)| {
                    let ctx = Arc::clone(&self.ctx);
                    let adjudicator = self.adjudicator.clone();
                    let ledger = Arc::clone(&ledger);
                    tokio::spawn(async move {
                        resolve_metric(ctx, adjudicator, ledger, metric, metric_groups).await
                    })
                })
                .buffer_unordered(self.ctx.workers)
                .map(|joined| joined.map_err(ResolveError::from))
                .collect()
                .await;

            let mut tier_resolutions = Vec::new();
            for outcome in outcomes {
                let outcome = outcome?;
                tier_resolutions.extend(outcome.resolutions);
                verdicts.extend(outcome.verdicts);
                all_candidates.extend(outcome.candidates);
            }

            ledger = Arc::new(ledger.extended_with(&tier_resolutions));
            resolutions.extend(tier_resolutions);
        }

        for (metric, leftover) in groups {
            warn!(
                "{}: {} periods skipped, metric is not in the registry",
                metric,
                leftover.len()
            );
        }

        if let Some(targets) = &targets {
            resolutions.extend(missing_targets(targets, &observed, &resolutions));
        }

        let registry = &self.ctx.registry;
        resolutions.sort_by(|a, b| {
            registry
                .order(a.metric)
                .cmp(&registry.order(b.metric))
                .then_with(|| {
                    a.period
                        .as_ref()
                        .map(PeriodSpec::key)
                        .cmp(&b.period.as_ref().map(PeriodSpec::key))
                })
        });
        all_candidates.sort_by(|a, b| a.id().cmp(b.id()));
        // Tasks finish in any order; keep per-candidate rule order
        verdicts.sort_by(|a, b| a.candidate_id.cmp(&b.candidate_id));

        let summary = ValidationSummary::from_verdicts(&verdicts);
        let resolved = resolutions.iter().filter(|r| r.is_resolved()).count();
        info!(
            "Document {}: {} resolved, {} unresolved, {} candidates, {} verdicts ({} fail)",
            document_id,
            resolved,
            resolutions.len() - resolved,
            all_candidates.len(),
            summary.total,
            summary.failed
        );

        Ok(DocumentResolution {
            document_id,
            run_id,
            resolutions,
            candidates: all_candidates,
            verdicts,
            summary,
        })
    }

    fn known_targets(&self, targets: Vec<MetricId>) -> Vec<MetricId> {
        let mut known = Vec::with_capacity(targets.len());
        for metric in targets {
            if !self.ctx.registry.contains(metric) {
                warn!("Target {} is not in the metric registry; ignored", metric);
            } else if !known.contains(&metric) {
                known.push(metric);
            }
        }
        known
    }
}

/// Resolve all periods of one metric, oldest first
async fn resolve_metric(
    ctx: Arc<ResolutionContext>,
    adjudicator: Adjudicator,
    ledger: Arc<ResolvedLedger>,
    metric: MetricId,
    groups: MetricGroups,
) -> MetricOutcome {
    let mut outcome = MetricOutcome {
        resolutions: Vec::with_capacity(groups.len()),
        verdicts: Vec::new(),
        candidates: Vec::new(),
    };
    let mut resolved: BTreeMap<PeriodKey, Decimal> = BTreeMap::new();

    for (key, group) in groups {
        let Some(period) = group.first().map(|c| c.period().clone()) else {
            continue;
        };

        let inputs = RuleInputs {
            prior: prior_year_value(&resolved, key),
            ledger: &ledger,
        };
        let verdicts = validators::validate_group(&group, &ctx, &inputs);
        let survivors = validators::survivors(&group, &verdicts);

        let resolution = adjudicator
            .adjudicate(metric, &period, &group, &survivors, &verdicts)
            .await;

        debug!(
            "{} {}: {} ({} candidates, {} survivors)",
            metric,
            period,
            resolution.method,
            group.len(),
            survivors.len()
        );

        if let Some(value) = resolution.value {
            resolved.insert(key, value);
        }

        outcome.resolutions.push(resolution);
        outcome.verdicts.extend(verdicts);
        outcome.candidates.extend(group);
    }

    outcome
}

/// Resolved value of the same kind of period one year earlier
fn prior_year_value(resolved: &BTreeMap<PeriodKey, Decimal>, key: PeriodKey) -> Option<Decimal> {
    resolved
        .iter()
        .rev()
        .find(|(k, _)| k.is_year_before(&key))
        .map(|(_, value)| *value)
}

fn merge_defaults(
    request: Option<&DocumentDefaults>,
    configured: &DocumentDefaults,
) -> DocumentDefaults {
    let Some(request) = request else {
        return configured.clone();
    };
    DocumentDefaults {
        currency: request.currency.clone().or_else(|| configured.currency.clone()),
        scale: request.scale.clone().or_else(|| configured.scale.clone()),
        period: request.period.clone().or_else(|| configured.period.clone()),
    }
}

fn observed_periods(candidates: &[Candidate]) -> BTreeMap<PeriodKey, PeriodSpec> {
    let mut observed = BTreeMap::new();
    for candidate in candidates {
        observed
            .entry(candidate.period().key())
            .or_insert_with(|| candidate.period().clone());
    }
    observed
}

fn group_candidates(candidates: Vec<Candidate>) -> HashMap<MetricId, MetricGroups> {
    let mut groups: HashMap<MetricId, MetricGroups> = HashMap::new();
    for candidate in candidates {
        groups
            .entry(candidate.metric())
            .or_default()
            .entry(candidate.period().key())
            .or_default()
            .push(candidate);
    }
    groups
}

/// Unresolved records for target metric/period pairs that produced no group
fn missing_targets(
    targets: &[MetricId],
    observed: &BTreeMap<PeriodKey, PeriodSpec>,
    resolutions: &[Resolution],
) -> Vec<Resolution> {
    let reason = UnresolvedReason::NoCandidates;
    let mut missing = Vec::new();

    for &metric in targets {
        if observed.is_empty() {
            missing.push(Resolution::unresolved(
                metric,
                None,
                reason,
                reason.describe(),
                Vec::new(),
            ));
            continue;
        }

        for (key, period) in observed {
            let covered = resolutions.iter().any(|r| {
                r.metric == metric && r.period.as_ref().map(PeriodSpec::key) == Some(*key)
            });
            if !covered {
                missing.push(Resolution::unresolved(
                    metric,
                    Some(period.clone()),
                    reason,
                    reason.describe(),
                    Vec::new(),
                ));
            }
        }
    }

    if !missing.is_empty() {
        info!("{} target metric/period pairs had no candidates", missing.len());
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PeriodKind;
    use chrono::NaiveDate;

    fn key(year: i32, month: u32, day: u32, kind: PeriodKind) -> PeriodKey {
        PeriodKey {
            end: NaiveDate::from_ymd_opt(year, month, day).unwrap(),
            kind,
        }
    }

    #[test]
    fn test_prior_year_value_matches_same_kind_and_month() {
        let mut resolved = BTreeMap::new();
        resolved.insert(key(2022, 12, 31, PeriodKind::FiscalYear), Decimal::new(100, 0));
        resolved.insert(key(2023, 6, 30, PeriodKind::HalfYear), Decimal::new(40, 0));
        resolved.insert(key(2022, 6, 30, PeriodKind::HalfYear), Decimal::new(35, 0));

        assert_eq!(
            prior_year_value(&resolved, key(2023, 12, 31, PeriodKind::FiscalYear)),
            Some(Decimal::new(100, 0))
        );
        assert_eq!(
            prior_year_value(&resolved, key(2023, 6, 30, PeriodKind::HalfYear)),
            Some(Decimal::new(35, 0))
        );
        assert_eq!(
            prior_year_value(&resolved, key(2022, 12, 31, PeriodKind::FiscalYear)),
            None
        );
    }

    #[test]
    fn test_request_defaults_override_configured() {
        let configured = DocumentDefaults {
            currency: Some("GBP".to_string()),
            scale: Some("millions".to_string()),
            period: None,
        };
        let request = DocumentDefaults {
            currency: Some("USD".to_string()),
            scale: None,
            period: Some("FY2023".to_string()),
        };
        let merged = merge_defaults(Some(&request), &configured);
        assert_eq!(merged.currency.as_deref(), Some("USD"));
        assert_eq!(merged.scale.as_deref(), Some("millions"));
        assert_eq!(merged.period.as_deref(), Some("FY2023"));
        assert_eq!(merge_defaults(None, &configured), configured);
    }

    #[test]
    fn test_missing_targets_without_periods() {
        let missing = missing_targets(&[MetricId::Revenue], &BTreeMap::new(), &[]);
        assert_eq!(missing.len(), 1);
        assert!(missing[0].period.is_none());
        assert_eq!(missing[0].unresolved_reason, Some(UnresolvedReason::NoCandidates));
    }
}
