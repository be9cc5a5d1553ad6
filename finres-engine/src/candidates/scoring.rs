// Candidate Scoring - Heuristic Confidence
//
// Four independently capped components: source type, section relevance,
// period specificity, evidence completeness.

use crate::config::{ComponentWeight, ScoringConfig};
use crate::types::{Confidence, FragmentKind, SectionType};

/// Facts about a candidate that feed its confidence
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs<'a> {
    pub source: FragmentKind,
    pub section: SectionType,
    pub expected_sections: &'a [SectionType],
    pub period_explicit: bool,

    /// None when the metric takes no currency
    pub currency_explicit: Option<bool>,
    pub scale_explicit: bool,
}

/// Per-component contributions and their clamped total
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreBreakdown {
    pub source: f64,
    pub section: f64,
    pub period: f64,
    pub evidence: f64,
    pub total: Confidence,
}

fn contribution(component: ComponentWeight, raw: f64) -> f64 {
    (component.weight * raw.clamp(0.0, 1.0)).min(component.cap).max(0.0)
}

/// Score a candidate
pub fn score(inputs: &ScoreInputs<'_>, config: &ScoringConfig) -> ScoreBreakdown {
    let source_raw = match inputs.source {
        FragmentKind::TableCell => 1.0,
        FragmentKind::Text => config.text_source_raw,
    };

    let section_raw = if inputs.expected_sections.contains(&inputs.section) {
        1.0
    } else if inputs.section == SectionType::Notes || inputs.section.is_primary_statement() {
        config.notes_section_raw
    } else {
        config.other_section_raw
    };

    let period_raw = if inputs.period_explicit {
        1.0
    } else {
        config.inferred_period_raw
    };

    let dimensions = [
        Some(inputs.scale_explicit),
        inputs.currency_explicit,
        Some(inputs.period_explicit),
    ];
    let applicable = dimensions.iter().flatten().count();
    let present = dimensions.iter().flatten().filter(|explicit| **explicit).count();
    let evidence_raw = present as f64 / applicable as f64;

    let source = contribution(config.source_type, source_raw);
    let section = contribution(config.section_relevance, section_raw);
    let period = contribution(config.period_specificity, period_raw);
    let evidence = contribution(config.evidence_completeness, evidence_raw);

    ScoreBreakdown {
        source,
        section,
        period,
        evidence,
        total: (source + section + period + evidence).clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INCOME: &[SectionType] = &[SectionType::IncomeStatement];

    #[test]
    fn test_primary_table_cell_scores_full() {
        let inputs = ScoreInputs {
            source: FragmentKind::TableCell,
            section: SectionType::IncomeStatement,
            expected_sections: INCOME,
            period_explicit: true,
            currency_explicit: Some(true),
            scale_explicit: true,
        };
        let breakdown = score(&inputs, &ScoringConfig::default());
        assert!((breakdown.total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_narrative_mention_scores_lower() {
        let config = ScoringConfig::default();
        let table = score(
            &ScoreInputs {
                source: FragmentKind::TableCell,
                section: SectionType::IncomeStatement,
                expected_sections: INCOME,
                period_explicit: true,
                currency_explicit: Some(false),
                scale_explicit: false,
            },
            &config,
        );
        let text = score(
            &ScoreInputs {
                source: FragmentKind::Text,
                section: SectionType::Narrative,
                expected_sections: INCOME,
                period_explicit: false,
                currency_explicit: Some(false),
                scale_explicit: false,
            },
            &config,
        );
        assert!(text.total < table.total);
        assert!((text.source - 0.2).abs() < 1e-9);
        assert!((text.section - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_caps_limit_each_component() {
        let mut config = ScoringConfig::default();
        config.source_type = ComponentWeight::new(2.0, 0.3);
        let breakdown = score(
            &ScoreInputs {
                source: FragmentKind::TableCell,
                section: SectionType::Other,
                expected_sections: INCOME,
                period_explicit: false,
                currency_explicit: None,
                scale_explicit: false,
            },
            &config,
        );
        assert!((breakdown.source - 0.3).abs() < 1e-9);
        assert!(breakdown.total <= 1.0);
    }
}
