// Arithmetic Closure - Subtotals Equal Their Resolved Constituents
//
// e.g. GROSS_PROFIT = REVENUE - COST_OF_SALES. Subtracted terms use the
// magnitude of the constituent, since cost lines are often printed negative.
// No verdict when the metric has no closure rule, a constituent is not
// resolved for the same period, or the constituents cannot be summed.

use crate::types::{Candidate, MetricDefinition, ResolvedLedger, RuleName, TermSign, Verdict};
use crate::validators::within_tolerance;
use rust_decimal::Decimal;

pub fn check(
    candidate: &Candidate,
    definition: &MetricDefinition,
    ledger: &ResolvedLedger,
    tolerance: f64,
) -> Option<Verdict> {
    if definition.closure.is_empty() {
        return None;
    }

    let period = candidate.period().key();
    let mut expected = Decimal::ZERO;
    let mut terms = Vec::with_capacity(definition.closure.len());

    for term in &definition.closure {
        let value = ledger.get(term.metric, period)?;
        match term.sign {
            TermSign::Add => {
                expected = expected.checked_add(value)?;
                terms.push(format!("+ {} {}", term.metric, value));
            }
            TermSign::Subtract => {
                expected = expected.checked_sub(value.abs())?;
                terms.push(format!("- {} {}", term.metric, value.abs()));
            }
        }
    }

    let actual = candidate.normalized_value();
    let detail = terms.join(" ");

    if within_tolerance(actual, expected, tolerance) {
        Some(Verdict::pass(
            candidate,
            RuleName::ArithmeticClosure,
            format!("{} closes: {} = {}", definition.id, detail, expected),
        ))
    } else {
        Some(Verdict::fail(
            candidate,
            RuleName::ArithmeticClosure,
            format!(
                "{} {} does not match {} = {} (tolerance {:.0}%)",
                definition.id,
                actual,
                detail,
                expected,
                tolerance * 100.0
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::builtin_definitions;
    use crate::test_support::{candidate, fy};
    use crate::types::{MetricId, VerdictOutcome};

    fn gross_profit() -> MetricDefinition {
        builtin_definitions()
            .into_iter()
            .find(|d| d.id == MetricId::GrossProfit)
            .unwrap()
    }

    fn ledger(revenue: i64, cost_of_sales: i64) -> ResolvedLedger {
        let period = fy(2023).key();
        let mut ledger = ResolvedLedger::new();
        ledger.insert(
            MetricId::Revenue,
            period,
            Decimal::new(revenue, 0) * Decimal::new(1_000_000, 0),
        );
        ledger.insert(
            MetricId::CostOfSales,
            period,
            Decimal::new(cost_of_sales, 0) * Decimal::new(1_000_000, 0),
        );
        ledger
    }

    #[test]
    fn test_mismatch_fails() {
        let c = candidate("gp", MetricId::GrossProfit, Decimal::new(400, 0), "millions", 0.9);
        let verdict = check(&c, &gross_profit(), &ledger(1000, 550), 0.05).unwrap();
        assert_eq!(verdict.outcome, VerdictOutcome::Fail);
    }

    #[test]
    fn test_negative_cost_line_still_closes() {
        let c = candidate("gp", MetricId::GrossProfit, Decimal::new(450, 0), "millions", 0.9);
        let verdict = check(&c, &gross_profit(), &ledger(1000, -550), 0.05).unwrap();
        assert_eq!(verdict.outcome, VerdictOutcome::Pass);
    }

    #[test]
    fn test_missing_constituent_is_not_applicable() {
        let c = candidate("gp", MetricId::GrossProfit, Decimal::new(450, 0), "millions", 0.9);
        let mut partial = ResolvedLedger::new();
        partial.insert(MetricId::Revenue, fy(2023).key(), Decimal::new(1_000_000_000, 0));
        assert!(check(&c, &gross_profit(), &partial, 0.05).is_none());
    }
}
