//! Aggregate view of a run's verdicts

use crate::types::{RuleName, Verdict, VerdictOutcome};
use serde::Serialize;
use std::collections::HashMap;

const MAX_COMMON_ISSUES: usize = 5;

/// One recurring non-pass outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommonIssue {
    pub rule: RuleName,
    pub outcome: VerdictOutcome,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub passed: usize,
    pub warnings: usize,
    pub failed: usize,
    pub common_issues: Vec<CommonIssue>,
}

impl ValidationSummary {
    pub fn from_verdicts(verdicts: &[Verdict]) -> Self {
        let mut summary = ValidationSummary {
            total: verdicts.len(),
            ..Default::default()
        };
        let mut issues: HashMap<(RuleName, VerdictOutcome), usize> = HashMap::new();

        for verdict in verdicts {
            match verdict.outcome {
                VerdictOutcome::Pass => summary.passed += 1,
                VerdictOutcome::Warning => summary.warnings += 1,
                VerdictOutcome::Fail => summary.failed += 1,
            }
            if verdict.outcome != VerdictOutcome::Pass {
                *issues.entry((verdict.rule, verdict.outcome)).or_insert(0) += 1;
            }
        }

        let mut common: Vec<CommonIssue> = issues
            .into_iter()
            .map(|((rule, outcome), count)| CommonIssue {
                rule,
                outcome,
                count,
            })
            .collect();
        common.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.rule.as_str().cmp(b.rule.as_str()))
                .then_with(|| (a.outcome as u8).cmp(&(b.outcome as u8)))
        });
        common.truncate(MAX_COMMON_ISSUES);
        summary.common_issues = common;

        summary
    }

    /// Share of verdicts that passed (1.0 when there are none)
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::candidate;
    use crate::types::MetricId;
    use rust_decimal::Decimal;

    #[test]
    fn test_counts_and_pass_rate() {
        let c = candidate("a", MetricId::Revenue, Decimal::new(10, 0), "millions", 0.5);
        let verdicts = vec![
            Verdict::pass(&c, RuleName::RangeCheck, "ok"),
            Verdict::pass(&c, RuleName::UnitConsistency, "ok"),
            Verdict::warning(&c, RuleName::YoyPlausibility, "jump"),
            Verdict::fail(&c, RuleName::ArithmeticClosure, "mismatch"),
        ];
        let summary = ValidationSummary::from_verdicts(&verdicts);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.warnings, 1);
        assert!((summary.pass_rate() - 0.5).abs() < 1e-9);
        assert_eq!(summary.common_issues.len(), 2);
        // Equal counts fall back to rule name order
        assert_eq!(summary.common_issues[0].rule, RuleName::ArithmeticClosure);
    }

    #[test]
    fn test_empty_summary() {
        let summary = ValidationSummary::from_verdicts(&[]);
        assert_eq!(summary.pass_rate(), 1.0);
        assert!(summary.common_issues.is_empty());
    }
}
