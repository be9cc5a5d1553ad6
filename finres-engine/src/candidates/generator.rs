// Candidate Generator - Fragments to Competing Candidates
//
// Emits one Candidate per metric occurrence. Fragments that fail metric,
// value, unit or period resolution are skipped without error.

use crate::candidates::numbers::{find_amounts, parse_amount, ParsedAmount};
use crate::candidates::scoring::{score, ScoreInputs};
use crate::context::ResolutionContext;
use crate::normalize::labels::LabelMatch;
use crate::normalize::periods::{
    detect_fiscal_year_end, find_year_in_text, parse_period_label_with, FiscalYearEnd,
};
use crate::types::{
    Candidate, CandidateDraft, DocumentDefaults, DocumentPosition, ExplicitDimensions, Fragment,
    FragmentKind, GenerationReason, MetricDefinition, MetricId, PeriodSpec, SectionType,
    ValueDomain,
};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, info};

const EVIDENCE_MAX_CHARS: usize = 240;

static MONTH_AFTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:st|nd|rd|th)?\s+(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)",
    )
    .unwrap()
});

static MONTH_BEFORE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+$").unwrap()
});

/// Document-wide facts gathered before per-fragment work
struct DocumentScan {
    fy_end: Option<FiscalYearEnd>,
    section_ranks: HashMap<SectionType, u32>,
    default_period: Option<PeriodSpec>,
}

/// Numeric reading of a clause or cell
struct Reading {
    value: Decimal,
    currency_marker: Option<String>,
    scale_marker: Option<String>,
}

/// Text surrounding a reading, most local first
struct Surroundings<'t> {
    unit_sources: Vec<&'t str>,
    period_sources: Vec<&'t str>,

    /// Running text searched for a plain year once no period label matched
    prose: Vec<&'t str>,

    evidence: String,
}

/// One metric occurrence inside a fragment
struct Clause<'t> {
    index: usize,
    metric: MetricId,
    reading: Reading,
    surroundings: Surroundings<'t>,
}

/// Generates candidates for one document
pub struct CandidateGenerator<'a> {
    ctx: &'a ResolutionContext,
}

impl<'a> CandidateGenerator<'a> {
    pub fn new(ctx: &'a ResolutionContext) -> Self {
        Self { ctx }
    }

    /// Generate candidates using the configured document defaults
    pub fn generate(&self, fragments: &[Fragment], targets: Option<&[MetricId]>) -> Vec<Candidate> {
        self.generate_with_defaults(fragments, targets, &self.ctx.defaults)
    }

    /// Generate candidates for every fragment
    ///
    /// # Arguments
    /// * `fragments` - Document fragments in reading order
    /// * `targets` - Optional metric filter
    /// * `defaults` - Currency, scale and period used when a fragment has none
    ///
    /// # Returns
    /// * Candidates in fragment order; several per (metric, period) are expected
    pub fn generate_with_defaults(
        &self,
        fragments: &[Fragment],
        targets: Option<&[MetricId]>,
        defaults: &DocumentDefaults,
    ) -> Vec<Candidate> {
        let scan = self.scan(fragments, defaults);
        let mut candidates = Vec::new();
        let mut skipped = 0usize;

        for fragment in fragments {
            let clauses = match fragment.kind {
                FragmentKind::TableCell => self.cell_clause(fragment).into_iter().collect(),
                FragmentKind::Text => self.text_clauses(fragment),
            };

            if clauses.is_empty() {
                debug!("Fragment {}: no metric/value found", fragment.id);
                skipped += 1;
                continue;
            }

            for clause in clauses {
                if let Some(targets) = targets {
                    if !targets.contains(&clause.metric) {
                        continue;
                    }
                }
                match self.build(fragment, clause, &scan, defaults) {
                    Some(candidate) => candidates.push(candidate),
                    None => skipped += 1,
                }
            }
        }

        info!(
            "Generated {} candidates from {} fragments ({} skipped)",
            candidates.len(),
            fragments.len(),
            skipped
        );
        candidates
    }

    fn scan(&self, fragments: &[Fragment], defaults: &DocumentDefaults) -> DocumentScan {
        let mut labels: Vec<&str> = Vec::new();
        let mut section_ranks: HashMap<SectionType, u32> = HashMap::new();

        for fragment in fragments {
            let next_rank = section_ranks.len() as u32;
            section_ranks.entry(fragment.section).or_insert(next_rank);

            labels.extend(fragment.context.column_label.as_deref());
            labels.extend(fragment.context.header.as_deref());
            if fragment.kind == FragmentKind::Text {
                labels.push(&fragment.raw_text);
            }
        }

        let fy_end = detect_fiscal_year_end(&labels);
        let default_period = defaults
            .period
            .as_deref()
            .and_then(|label| parse_period_label_with(label, fy_end));

        if let Some((month, day)) = fy_end {
            debug!("Detected fiscal year end {:02}-{:02}", month, day);
        }

        DocumentScan {
            fy_end,
            section_ranks,
            default_period,
        }
    }

    fn cell_clause<'t>(&self, fragment: &'t Fragment) -> Option<Clause<'t>> {
        let ctx = &fragment.context;
        let metric = ctx
            .row_label
            .as_deref()
            .and_then(|label| self.ctx.labels.standardize(label))
            .or_else(|| self.ctx.labels.standardize(&fragment.raw_text))
            .or_else(|| {
                ctx.header
                    .as_deref()
                    .and_then(|header| self.ctx.labels.standardize(header))
            })?;
        let definition = self.ctx.registry.get(metric)?;

        let parsed = parse_amount(&fragment.raw_text, self.ctx.number_locale);
        let (value, percent) = match (fragment.value, &parsed) {
            (Some(value), parsed) => (value, parsed.as_ref().map_or(false, |p| p.percent)),
            (None, Some(parsed)) => (parsed.value, parsed.percent),
            (None, None) => return None,
        };
        let value = value_for_domain(value, percent, definition.domain)?;

        let mut unit_sources = vec![fragment.raw_text.as_str()];
        unit_sources.extend(ctx.unit_hint.as_deref());
        unit_sources.extend(ctx.column_label.as_deref());
        unit_sources.extend(ctx.header.as_deref());

        let mut period_sources: Vec<&str> = Vec::new();
        period_sources.extend(ctx.column_label.as_deref());
        period_sources.extend(ctx.header.as_deref());
        period_sources.push(&fragment.raw_text);

        let evidence = format!(
            "{} | {} | {}",
            ctx.row_label.as_deref().unwrap_or("-"),
            ctx.column_label.as_deref().unwrap_or("-"),
            fragment.raw_text.trim()
        );

        Some(Clause {
            index: 0,
            metric,
            reading: Reading {
                value,
                currency_marker: parsed.as_ref().and_then(|p| p.currency_marker.clone()),
                scale_marker: parsed.as_ref().and_then(|p| p.scale_marker.clone()),
            },
            surroundings: Surroundings {
                unit_sources,
                period_sources,
                prose: Vec::new(),
                evidence,
            },
        })
    }

    fn text_clauses<'t>(&self, fragment: &'t Fragment) -> Vec<Clause<'t>> {
        let ctx = &fragment.context;
        let mut clauses = Vec::new();
        let mut index = 0usize;

        for sentence in split_sentences(&fragment.raw_text) {
            let matches = self.ctx.labels.find_all(sentence);
            for (k, label) in matches.iter().enumerate() {
                let clause_index = index;
                index += 1;

                let Some(definition) = self.ctx.registry.get(label.metric) else {
                    continue;
                };
                let Some((segment, amount)) =
                    self.locate_amount(sentence, &matches, k, definition.domain)
                else {
                    continue;
                };
                let Some(value) =
                    value_for_domain(amount.value, amount.percent, definition.domain)
                else {
                    continue;
                };

                clauses.push(Clause {
                    index: clause_index,
                    metric: label.metric,
                    reading: Reading {
                        value,
                        currency_marker: amount.currency_marker.clone(),
                        scale_marker: amount.scale_marker.clone(),
                    },
                    surroundings: self.text_surroundings(fragment, segment, sentence),
                });
            }
        }

        // A bare statement under a metric header ("£512m, up 8%")
        if index == 0 {
            let header_metric = ctx
                .header
                .as_deref()
                .and_then(|header| self.ctx.labels.standardize(header));
            if let Some(metric) = header_metric {
                if let Some(definition) = self.ctx.registry.get(metric) {
                    let text = fragment.raw_text.as_str();
                    let amount = find_amounts(text, self.ctx.number_locale)
                        .into_iter()
                        .find(|a| qualifies_in_text(text, a, definition.domain));
                    if let Some(amount) = amount {
                        if let Some(value) =
                            value_for_domain(amount.value, amount.percent, definition.domain)
                        {
                            clauses.push(Clause {
                                index: 0,
                                metric,
                                reading: Reading {
                                    value,
                                    currency_marker: amount.currency_marker,
                                    scale_marker: amount.scale_marker,
                                },
                                surroundings: self.text_surroundings(fragment, text, text),
                            });
                        }
                    }
                }
            }
        }

        clauses
    }

    /// Amount belonging to the `k`th label of a sentence
    ///
    /// Looks after the label up to the next label; a sentence with a single
    /// label may also take the closest amount before it.
    fn locate_amount<'t>(
        &self,
        sentence: &'t str,
        matches: &[LabelMatch],
        k: usize,
        domain: ValueDomain,
    ) -> Option<(&'t str, ParsedAmount)> {
        let label = matches[k];
        let after_end = matches.get(k + 1).map_or(sentence.len(), |next| next.start);
        let after = &sentence[label.end..after_end];

        let found = find_amounts(after, self.ctx.number_locale)
            .into_iter()
            .find(|a| qualifies_in_text(after, a, domain));
        if let Some(amount) = found {
            return Some((after, amount));
        }

        if matches.len() == 1 {
            let before = &sentence[..label.start];
            let found = find_amounts(before, self.ctx.number_locale)
                .into_iter()
                .filter(|a| qualifies_in_text(before, a, domain))
                .last();
            if let Some(amount) = found {
                return Some((before, amount));
            }
        }

        None
    }

    fn text_surroundings<'t>(
        &self,
        fragment: &'t Fragment,
        segment: &'t str,
        sentence: &'t str,
    ) -> Surroundings<'t> {
        let ctx = &fragment.context;

        let mut unit_sources = vec![segment, sentence];
        unit_sources.extend(ctx.unit_hint.as_deref());
        unit_sources.extend(ctx.header.as_deref());

        let mut period_sources = vec![segment, sentence];
        period_sources.extend(ctx.header.as_deref());
        period_sources.extend(ctx.column_label.as_deref());

        Surroundings {
            unit_sources,
            period_sources,
            prose: vec![segment, sentence],
            evidence: truncate(sentence.trim(), EVIDENCE_MAX_CHARS),
        }
    }

    fn build(
        &self,
        fragment: &Fragment,
        clause: Clause<'_>,
        scan: &DocumentScan,
        defaults: &DocumentDefaults,
    ) -> Option<Candidate> {
        let definition = self.ctx.registry.get(clause.metric)?;
        let sources = &clause.surroundings;

        let labelled = sources
            .period_sources
            .iter()
            .find_map(|text| parse_period_label_with(text, scan.fy_end))
            .or_else(|| {
                sources
                    .prose
                    .iter()
                    .find_map(|text| find_year_in_text(text, scan.fy_end))
            });

        let (period, period_explicit) = match labelled {
            Some(period) => (period, true),
            None => match &scan.default_period {
                Some(period) => (period.clone(), false),
                None => {
                    debug!(
                        "Fragment {} clause {}: no period for {}",
                        fragment.id, clause.index, clause.metric
                    );
                    return None;
                }
            },
        };

        let (currency, currency_explicit) = self.resolve_currency(&clause, definition, defaults);
        let (scale, scale_explicit) =
            self.resolve_scale(&clause, fragment.kind, definition, defaults);

        let explicit = ExplicitDimensions {
            period: period_explicit,
            currency: currency_explicit,
            scale: scale_explicit,
        };

        let breakdown = score(
            &ScoreInputs {
                source: fragment.kind,
                section: fragment.section,
                expected_sections: &definition.expected_sections,
                period_explicit,
                currency_explicit: (definition.domain == ValueDomain::Monetary)
                    .then_some(currency_explicit),
                scale_explicit,
            },
            &self.ctx.scoring,
        );

        let draft = CandidateDraft {
            id: format!("{}:{}", fragment.id, clause.index),
            metric: clause.metric,
            period,
            value: clause.reading.value,
            currency,
            scale,
            fragment_ids: vec![fragment.id.clone()],
            provenance: format!("{} p.{} [{}]", fragment.section, fragment.page, fragment.id),
            confidence: breakdown.total,
            reason: generation_reason(fragment.kind, fragment.section),
            source_kind: fragment.kind,
            section: fragment.section,
            position: DocumentPosition {
                page: fragment.page,
                section_rank: scan.section_ranks.get(&fragment.section).copied().unwrap_or(0),
            },
            evidence: sources.evidence.clone(),
            explicit,
        };

        match Candidate::new(draft, &self.ctx.normalizer, definition.domain) {
            Ok(candidate) => {
                debug!(
                    "Candidate {} {} {} = {} (confidence {:.2})",
                    candidate.id(),
                    candidate.metric(),
                    candidate.period(),
                    candidate.normalized_value(),
                    candidate.confidence()
                );
                Some(candidate)
            }
            Err(e) => {
                debug!(
                    "Fragment {} clause {}: skipped {} ({})",
                    fragment.id, clause.index, clause.metric, e
                );
                None
            }
        }
    }

    fn resolve_currency(
        &self,
        clause: &Clause<'_>,
        definition: &MetricDefinition,
        defaults: &DocumentDefaults,
    ) -> (Option<String>, bool) {
        if definition.domain != ValueDomain::Monetary {
            return (None, false);
        }

        let normalizer = &self.ctx.normalizer;
        let found = clause
            .reading
            .currency_marker
            .as_deref()
            .and_then(|marker| normalizer.detect_currency(marker))
            .or_else(|| {
                clause
                    .surroundings
                    .unit_sources
                    .iter()
                    .find_map(|text| normalizer.detect_currency(text))
            });

        match found {
            Some(code) => (Some(code), true),
            None => (defaults.currency.clone(), false),
        }
    }

    fn resolve_scale(
        &self,
        clause: &Clause<'_>,
        kind: FragmentKind,
        definition: &MetricDefinition,
        defaults: &DocumentDefaults,
    ) -> (String, bool) {
        let normalizer = &self.ctx.normalizer;

        if let Some(marker) = clause.reading.scale_marker.as_deref() {
            if let Ok(scale) = normalizer.canonical_scale(marker) {
                return (scale, true);
            }
        }

        if definition.domain == ValueDomain::Ratio {
            return ("actual".to_string(), true);
        }

        // "£512,000" in prose is already a complete figure
        if kind == FragmentKind::Text && clause.reading.currency_marker.is_some() {
            let local = clause
                .surroundings
                .unit_sources
                .first()
                .and_then(|segment| normalizer.detect_scale(segment));
            return (local.unwrap_or_else(|| "actual".to_string()), true);
        }

        if let Some(scale) = clause
            .surroundings
            .unit_sources
            .iter()
            .find_map(|text| normalizer.detect_scale(text))
        {
            return (scale, true);
        }

        match (definition.domain, &defaults.scale) {
            (ValueDomain::Monetary, Some(scale)) => (scale.clone(), false),
            _ => ("actual".to_string(), false),
        }
    }
}

/// Apply the metric's value domain to a parsed number
fn value_for_domain(value: Decimal, percent: bool, domain: ValueDomain) -> Option<Decimal> {
    match (domain, percent) {
        (ValueDomain::Ratio, true) => Some(value / Decimal::ONE_HUNDRED),
        (ValueDomain::Ratio, false) => Some(value),
        (_, true) => None,
        (_, false) => Some(value),
    }
}

/// Whether an amount in prose can stand for a metric of `domain`
fn qualifies_in_text(text: &str, amount: &ParsedAmount, domain: ValueDomain) -> bool {
    match domain {
        ValueDomain::Monetary => amount.is_marked() && !amount.percent,
        ValueDomain::Ratio => amount.percent,
        ValueDomain::Count => {
            !amount.percent && !amount.looks_like_year() && !is_day_of_date(text, amount)
        }
    }
}

fn is_day_of_date(text: &str, amount: &ParsedAmount) -> bool {
    amount.value <= Decimal::new(31, 0)
        && (MONTH_AFTER_RE.is_match(&text[amount.end..])
            || MONTH_BEFORE_RE.is_match(&text[..amount.start]))
}

fn generation_reason(kind: FragmentKind, section: SectionType) -> GenerationReason {
    match (kind, section) {
        (_, SectionType::Notes) => GenerationReason::NoteCrossReference,
        (FragmentKind::TableCell, s) if s.is_primary_statement() => {
            GenerationReason::PrimaryStatementLine
        }
        (FragmentKind::TableCell, _) => GenerationReason::SupplementaryTable,
        (FragmentKind::Text, _) => GenerationReason::NarrativeMention,
    }
}

/// Split prose at sentence boundaries (".", ";", "!" or "?" followed by whitespace)
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | ';' | '!' | '?') {
            let at_boundary = chars.peek().map_or(true, |(_, next)| next.is_whitespace());
            if at_boundary {
                let end = i + c.len_utf8();
                let sentence = text[start..end].trim();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                start = end;
            }
        }
    }

    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}
