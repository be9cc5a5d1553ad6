// Year-over-Year Plausibility - Change Against the Prior Resolved Period
//
// Outside the configured band is a warning, never a fail. A move from
// profit to loss on a sign-sensitive metric also warns.

use crate::config::ValidationConfig;
use crate::types::{Candidate, MetricDefinition, RuleName, Verdict};
use crate::validators::relative_change;
use rust_decimal::Decimal;

pub fn check(
    candidate: &Candidate,
    definition: &MetricDefinition,
    prior: Option<Decimal>,
    config: &ValidationConfig,
) -> Option<Verdict> {
    let prior = prior?;
    if prior.is_zero() {
        return None;
    }

    let current = candidate.normalized_value();

    if config.warn_on_sign_flip
        && definition.sign_sensitive
        && prior.is_sign_positive()
        && current.is_sign_negative()
        && !current.is_zero()
    {
        return Some(Verdict::warning(
            candidate,
            RuleName::YoyPlausibility,
            format!(
                "{} turned from profit {} to loss {}",
                definition.id, prior, current
            ),
        ));
    }

    let change = relative_change(current, prior)?;

    if change > config.yoy_max_growth || change < config.yoy_min_growth {
        return Some(Verdict::warning(
            candidate,
            RuleName::YoyPlausibility,
            format!(
                "{} changed {:+.1}% from prior period ({} -> {}), outside [{:+.0}%, {:+.0}%]",
                definition.id,
                change * 100.0,
                prior,
                current,
                config.yoy_min_growth * 100.0,
                config.yoy_max_growth * 100.0
            ),
        ));
    }

    Some(Verdict::pass(
        candidate,
        RuleName::YoyPlausibility,
        format!("{:+.1}% change from prior period", change * 100.0),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::builtin_definitions;
    use crate::test_support::candidate;
    use crate::types::{MetricId, VerdictOutcome};

    fn ebitda() -> MetricDefinition {
        builtin_definitions()
            .into_iter()
            .find(|d| d.id == MetricId::Ebitda)
            .unwrap()
    }

    fn millions(v: i64) -> Decimal {
        Decimal::new(v, 0) * Decimal::new(1_000_000, 0)
    }

    #[test]
    fn test_fifty_fold_jump_warns() {
        let c = candidate("e", MetricId::Ebitda, Decimal::new(5000, 0), "millions", 0.8);
        let verdict =
            check(&c, &ebitda(), Some(millions(100)), &ValidationConfig::default()).unwrap();
        assert_eq!(verdict.outcome, VerdictOutcome::Warning);
    }

    #[test]
    fn test_modest_growth_passes() {
        let c = candidate("e", MetricId::Ebitda, Decimal::new(120, 0), "millions", 0.8);
        let verdict =
            check(&c, &ebitda(), Some(millions(100)), &ValidationConfig::default()).unwrap();
        assert_eq!(verdict.outcome, VerdictOutcome::Pass);
    }

    #[test]
    fn test_profit_to_loss_warns() {
        let c = candidate("e", MetricId::Ebitda, Decimal::new(-5, 0), "millions", 0.8);
        let verdict =
            check(&c, &ebitda(), Some(millions(100)), &ValidationConfig::default()).unwrap();
        assert_eq!(verdict.outcome, VerdictOutcome::Warning);
        assert!(verdict.message.contains("loss"));
    }

    #[test]
    fn test_sign_flip_warning_can_be_disabled() {
        let config = ValidationConfig {
            warn_on_sign_flip: false,
            yoy_min_growth: -2.0,
            ..ValidationConfig::default()
        };
        let c = candidate("e", MetricId::Ebitda, Decimal::new(-5, 0), "millions", 0.8);
        let verdict = check(&c, &ebitda(), Some(millions(100)), &config).unwrap();
        assert_eq!(verdict.outcome, VerdictOutcome::Pass);
    }

    #[test]
    fn test_no_prior_or_zero_prior_not_applicable() {
        let c = candidate("e", MetricId::Ebitda, Decimal::new(50, 0), "millions", 0.8);
        let config = ValidationConfig::default();
        assert!(check(&c, &ebitda(), None, &config).is_none());
        assert!(check(&c, &ebitda(), Some(Decimal::ZERO), &config).is_none());
    }
}
