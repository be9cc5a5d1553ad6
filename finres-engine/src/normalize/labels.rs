// Label Standardizer - Free-Text Labels to Canonical Metrics
//
// An ordered registry of (pattern, metric) entries. Entries are tried from
// most to least specific so "Adjusted EBITDA" never falls through to "EBITDA".

use crate::config::LabelMapping;
use crate::types::MetricId;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

/// Built-in surface forms
const BUILTIN_LABELS: &[(&str, MetricId)] = &[
    ("revenue", MetricId::Revenue),
    ("revenues", MetricId::Revenue),
    ("total revenue", MetricId::Revenue),
    ("net revenue", MetricId::Revenue),
    ("group revenue", MetricId::Revenue),
    ("sales", MetricId::Revenue),
    ("net sales", MetricId::Revenue),
    ("turnover", MetricId::Revenue),
    ("cost of sales", MetricId::CostOfSales),
    ("cost of revenue", MetricId::CostOfSales),
    ("cost of goods sold", MetricId::CostOfSales),
    ("cogs", MetricId::CostOfSales),
    ("gross profit", MetricId::GrossProfit),
    ("operating expenses", MetricId::OperatingExpenses),
    ("total operating expenses", MetricId::OperatingExpenses),
    ("opex", MetricId::OperatingExpenses),
    ("operating profit", MetricId::OperatingProfit),
    ("operating income", MetricId::OperatingProfit),
    ("profit from operations", MetricId::OperatingProfit),
    ("ebit", MetricId::OperatingProfit),
    ("ebitda", MetricId::Ebitda),
    ("adjusted ebitda", MetricId::AdjustedEbitda),
    ("underlying ebitda", MetricId::AdjustedEbitda),
    ("ebitda margin", MetricId::EbitdaMargin),
    ("adjusted ebitda margin", MetricId::EbitdaMargin),
    ("underlying ebitda margin", MetricId::EbitdaMargin),
    ("net income", MetricId::NetIncome),
    ("net profit", MetricId::NetIncome),
    ("profit for the year", MetricId::NetIncome),
    ("profit for the period", MetricId::NetIncome),
    ("profit after tax", MetricId::NetIncome),
    ("total debt", MetricId::TotalDebt),
    ("gross debt", MetricId::TotalDebt),
    ("borrowings", MetricId::TotalDebt),
    ("total borrowings", MetricId::TotalDebt),
    ("net debt", MetricId::NetDebt),
    ("cash", MetricId::Cash),
    ("cash at bank", MetricId::Cash),
    ("cash and cash equivalents", MetricId::Cash),
    ("total assets", MetricId::TotalAssets),
    ("current assets", MetricId::CurrentAssets),
    ("total current assets", MetricId::CurrentAssets),
    ("non current assets", MetricId::NonCurrentAssets),
    ("total non current assets", MetricId::NonCurrentAssets),
    ("total liabilities", MetricId::TotalLiabilities),
    ("current liabilities", MetricId::CurrentLiabilities),
    ("total current liabilities", MetricId::CurrentLiabilities),
    ("non current liabilities", MetricId::NonCurrentLiabilities),
    ("total non current liabilities", MetricId::NonCurrentLiabilities),
    ("total equity", MetricId::TotalEquity),
    ("shareholders equity", MetricId::TotalEquity),
    ("net assets", MetricId::TotalEquity),
    ("operating cash flow", MetricId::OperatingCashFlow),
    ("cash generated from operations", MetricId::OperatingCashFlow),
    ("net cash from operating activities", MetricId::OperatingCashFlow),
    ("net cash generated from operating activities", MetricId::OperatingCashFlow),
    ("free cash flow", MetricId::FreeCashFlow),
    ("employees", MetricId::Employees),
    ("headcount", MetricId::Employees),
    ("number of employees", MetricId::Employees),
    ("average number of employees", MetricId::Employees),
];

static PARENTHESIZED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\([^)]*\)").unwrap());

/// Label matched inside a longer text, as a byte span of the original text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelMatch {
    pub metric: MetricId,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone)]
struct LabelEntry {
    pattern: String,
    metric: MetricId,
    matcher: Regex,
}

/// Maps free-text labels to canonical metrics
#[derive(Debug, Clone)]
pub struct LabelStandardizer {
    entries: Vec<LabelEntry>,
}

impl LabelStandardizer {
    /// Built-in table plus `custom` mappings
    ///
    /// Custom mappings win ties of equal specificity.
    pub fn new(custom: &[LabelMapping]) -> Self {
        let pairs = custom
            .iter()
            .map(|m| (m.pattern.as_str(), m.metric))
            .chain(BUILTIN_LABELS.iter().copied());
        Self::from_entries(pairs)
    }

    /// Build from an explicit ordered table
    pub fn from_entries<'a>(pairs: impl IntoIterator<Item = (&'a str, MetricId)>) -> Self {
        let mut entries: Vec<LabelEntry> = pairs
            .into_iter()
            .filter_map(|(pattern, metric)| {
                let normalized = normalize_label(pattern);
                match build_matcher(&normalized) {
                    Some(matcher) => Some(LabelEntry {
                        pattern: normalized,
                        metric,
                        matcher,
                    }),
                    None => {
                        warn!("Ignoring unusable label pattern '{}'", pattern);
                        None
                    }
                }
            })
            .collect();

        // Stable sort keeps table order among equally specific entries
        entries.sort_by(|a, b| {
            word_count(&b.pattern)
                .cmp(&word_count(&a.pattern))
                .then_with(|| b.pattern.len().cmp(&a.pattern.len()))
        });

        Self { entries }
    }

    /// Map a label to its canonical metric
    ///
    /// # Arguments
    /// * `raw_label` - Label as printed (e.g. "Revenue (note 3)")
    ///
    /// # Returns
    /// * Metric of the longest matching span, the more specific entry on
    ///   equal spans; None for unmapped labels
    pub fn standardize(&self, raw_label: &str) -> Option<MetricId> {
        let masked = mask_label(raw_label);
        let mut best: Option<(usize, MetricId)> = None;
        for entry in &self.entries {
            if let Some(m) = entry.matcher.find(&masked) {
                let span = m.end() - m.start();
                if best.map_or(true, |(longest, _)| span > longest) {
                    best = Some((span, entry.metric));
                }
            }
        }
        best.map(|(_, metric)| metric)
    }

    /// Find every metric label in a longer text
    ///
    /// More specific entries claim their span first; overlapping weaker
    /// matches are dropped. Results are ordered by position.
    pub fn find_all(&self, text: &str) -> Vec<LabelMatch> {
        let masked = mask_label(text);
        let mut found: Vec<LabelMatch> = Vec::new();

        for entry in &self.entries {
            for m in entry.matcher.find_iter(&masked) {
                let overlaps = found.iter().any(|f| m.start() < f.end && f.start < m.end());
                if !overlaps {
                    found.push(LabelMatch {
                        metric: entry.metric,
                        start: m.start(),
                        end: m.end(),
                    });
                }
            }
        }

        found.sort_by_key(|m| m.start);
        found
    }
}

/// Normalize a label for comparison
///
/// Lowercases, drops parenthesized asides, treats punctuation as spaces and
/// collapses whitespace.
pub fn normalize_label(raw: &str) -> String {
    mask_label(raw)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lowercase copy with asides and punctuation blanked out
///
/// Byte offsets are preserved so matches map back onto the original text.
fn mask_label(raw: &str) -> String {
    let mut masked: String = raw
        .chars()
        .map(|c| {
            if c.is_alphanumeric() && c.is_ascii() {
                c.to_ascii_lowercase().to_string()
            } else if c.is_alphanumeric() {
                // Non-ASCII letters keep their width
                let lower: String = c.to_lowercase().collect();
                if lower.len() == c.len_utf8() {
                    lower
                } else {
                    c.to_string()
                }
            } else {
                " ".repeat(c.len_utf8())
            }
        })
        .collect();

    let spans: Vec<(usize, usize)> = PARENTHESIZED_RE
        .find_iter(raw)
        .map(|m| (m.start(), m.end()))
        .collect();
    for (start, end) in spans {
        masked.replace_range(start..end, &" ".repeat(end - start));
    }
    masked
}

fn word_count(pattern: &str) -> usize {
    pattern.split_whitespace().count()
}

/// Whole-word matcher; "and" is optional so "cash & cash equivalents" matches
fn build_matcher(normalized: &str) -> Option<Regex> {
    let words: Vec<&str> = normalized.split_whitespace().collect();
    if words.is_empty() {
        return None;
    }

    let mut pattern = String::from(r"\b");
    for (i, word) in words.iter().enumerate() {
        if *word == "and" && i > 0 && i + 1 < words.len() {
            pattern.push_str(r"(?:and\s+)?");
            continue;
        }
        pattern.push_str(&regex::escape(word));
        if i + 1 < words.len() {
            pattern.push_str(r"\s+");
        }
    }
    pattern.push_str(r"\b");
    Regex::new(&pattern).ok()
}
