// Deterministic Validator - Rule Set for One (Metric, Period) Group
//
// Rules: unit consistency, range check, arithmetic closure, year-over-year
// plausibility. Any `fail` verdict removes a candidate from selection.

pub mod arithmetic_closure;
pub mod range_check;
pub mod summary;
pub mod unit_consistency;
pub mod yoy_plausibility;

use crate::context::ResolutionContext;
use crate::types::{Candidate, ResolvedLedger, Verdict};
use rust_decimal::prelude::*;
use tracing::debug;

pub use summary::ValidationSummary;
pub use unit_consistency::cluster_by_value;

/// Values resolved outside the group that rules may consult
#[derive(Debug, Clone, Copy)]
pub struct RuleInputs<'a> {
    /// Resolved value of the same metric for the preceding period of the same kind
    pub prior: Option<Decimal>,

    /// Resolved values of other metrics (closure constituents)
    pub ledger: &'a ResolvedLedger,
}

/// Run every rule over one group
///
/// # Arguments
/// * `candidates` - All candidates for one metric and period
/// * `ctx` - Resolution context (registry, tolerances)
/// * `inputs` - Prior-period and constituent values
///
/// # Returns
/// * One verdict per applicable (candidate, rule) pair
pub fn validate_group(
    candidates: &[Candidate],
    ctx: &ResolutionContext,
    inputs: &RuleInputs<'_>,
) -> Vec<Verdict> {
    let Some(first) = candidates.first() else {
        return Vec::new();
    };
    let Some(definition) = ctx.registry.get(first.metric()) else {
        return Vec::new();
    };
    let config = &ctx.validation;

    let mut verdicts = unit_consistency::check(candidates, config.unit_tolerance);

    for candidate in candidates {
        verdicts.push(range_check::check(
            candidate,
            definition,
            config.range_warning_margin,
        ));

        if let Some(verdict) = arithmetic_closure::check(
            candidate,
            definition,
            inputs.ledger,
            config.closure_tolerance,
        ) {
            verdicts.push(verdict);
        }

        if let Some(verdict) =
            yoy_plausibility::check(candidate, definition, inputs.prior, config)
        {
            verdicts.push(verdict);
        }
    }

    debug!(
        "Validated {} {}: {} candidates, {} verdicts ({} fail)",
        first.metric(),
        first.period(),
        candidates.len(),
        verdicts.len(),
        verdicts.iter().filter(|v| v.is_fail()).count()
    );

    verdicts
}

/// Candidates without any `fail` verdict
pub fn survivors<'c>(candidates: &'c [Candidate], verdicts: &[Verdict]) -> Vec<&'c Candidate> {
    candidates
        .iter()
        .filter(|c| {
            !verdicts
                .iter()
                .any(|v| v.candidate_id == c.id() && v.is_fail())
        })
        .collect()
}

/// `|a - b| <= tolerance * max(|a|, |b|)`
///
/// False when the arithmetic overflows.
pub fn within_tolerance(a: Decimal, b: Decimal, tolerance: f64) -> bool {
    let scale = a.abs().max(b.abs());
    if scale.is_zero() {
        return true;
    }
    let tolerance = Decimal::from_f64(tolerance).unwrap_or(Decimal::ZERO);
    match (a.checked_sub(b), tolerance.checked_mul(scale)) {
        (Some(diff), Some(allowed)) => diff.abs() <= allowed,
        _ => false,
    }
}

/// `(current - prior) / |prior|` as a float
///
/// None when `prior` is zero or the arithmetic overflows.
pub fn relative_change(current: Decimal, prior: Decimal) -> Option<f64> {
    if prior.is_zero() {
        return None;
    }
    current
        .checked_sub(prior)?
        .checked_div(prior.abs())?
        .to_f64()
}
