// Range Check - Normalized Value Within the Metric's Plausible Range

use crate::types::{Candidate, MetricDefinition, RuleName, Verdict};
use rust_decimal::prelude::*;

/// Check one candidate against its metric's declared range
///
/// # Arguments
/// * `candidate` - Candidate to check
/// * `definition` - Metric definition holding `min`/`max` in base units
/// * `margin` - Share of a bound treated as near the boundary
///
/// # Returns
/// * `fail` outside the range, `warning` within `margin * |bound|` of a bound
pub fn check(candidate: &Candidate, definition: &MetricDefinition, margin: f64) -> Verdict {
    let value = candidate.normalized_value();

    if value < definition.min || value > definition.max {
        return Verdict::fail(
            candidate,
            RuleName::RangeCheck,
            format!(
                "{} value {} outside plausible range [{}, {}]",
                definition.display_name, value, definition.min, definition.max
            ),
        );
    }

    let margin = Decimal::from_f64(margin).unwrap_or(Decimal::ZERO);
    let near = |bound: Decimal| match (value.checked_sub(bound), margin.checked_mul(bound.abs())) {
        (Some(distance), Some(allowed)) => distance.abs() <= allowed,
        _ => false,
    };

    if near(definition.min) || near(definition.max) {
        return Verdict::warning(
            candidate,
            RuleName::RangeCheck,
            format!(
                "{} value {} is near the edge of [{}, {}]",
                definition.display_name, value, definition.min, definition.max
            ),
        );
    }

    Verdict::pass(candidate, RuleName::RangeCheck, "Within plausible range")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::builtin_definitions;
    use crate::test_support::candidate;
    use crate::types::{MetricId, VerdictOutcome};

    fn definition(id: MetricId) -> MetricDefinition {
        builtin_definitions().into_iter().find(|d| d.id == id).unwrap()
    }

    #[test]
    fn test_negative_revenue_fails() {
        let c = candidate("a", MetricId::Revenue, Decimal::new(-5, 0), "millions", 0.9);
        let verdict = check(&c, &definition(MetricId::Revenue), 0.05);
        assert_eq!(verdict.outcome, VerdictOutcome::Fail);
    }

    #[test]
    fn test_typical_value_passes() {
        let c = candidate("a", MetricId::Revenue, Decimal::new(500, 0), "millions", 0.9);
        let verdict = check(&c, &definition(MetricId::Revenue), 0.05);
        assert_eq!(verdict.outcome, VerdictOutcome::Pass);
    }

    #[test]
    fn test_near_upper_bound_warns() {
        let mut def = definition(MetricId::Revenue);
        def.max = Decimal::new(1_000_000_000, 0);
        let c = candidate("a", MetricId::Revenue, Decimal::new(980, 0), "millions", 0.9);
        let verdict = check(&c, &def, 0.05);
        assert_eq!(verdict.outcome, VerdictOutcome::Warning);
    }

    #[test]
    fn test_extreme_bounds_do_not_overflow() {
        let mut def = definition(MetricId::NetDebt);
        def.min = Decimal::MIN;
        def.max = Decimal::MAX;
        let c = candidate("a", MetricId::NetDebt, Decimal::new(-40, 0), "millions", 0.9);
        let verdict = check(&c, &def, 0.5);
        assert_eq!(verdict.outcome, VerdictOutcome::Pass);
    }
}
