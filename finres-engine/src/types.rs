// Resolution Types - Fragments, Candidates, Verdicts, Resolutions
//
// Data flows one way: Fragment -> Candidate -> Verdict -> Resolution.
// Every record below is created once and never mutated afterwards.

use crate::error::UnitError;
use crate::normalize::units::UnitNormalizer;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Heuristic confidence (0.0-1.0)
pub type Confidence = f64;

// ============================================================================
// Fragments (upstream input)
// ============================================================================

/// Fragment origin within the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentKind {
    TableCell,
    Text,
}

/// Section tag assigned upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionType {
    IncomeStatement,
    BalanceSheet,
    CashFlow,
    Notes,
    Narrative,
    #[serde(other)]
    Other,
}

impl SectionType {
    /// Primary financial statements (income statement, balance sheet, cash flow)
    pub fn is_primary_statement(self) -> bool {
        matches!(
            self,
            SectionType::IncomeStatement | SectionType::BalanceSheet | SectionType::CashFlow
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SectionType::IncomeStatement => "income_statement",
            SectionType::BalanceSheet => "balance_sheet",
            SectionType::CashFlow => "cash_flow",
            SectionType::Notes => "notes",
            SectionType::Narrative => "narrative",
            SectionType::Other => "other",
        }
    }
}

impl fmt::Display for SectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Surrounding labels captured with a fragment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FragmentContext {
    /// Nearest section or table header
    #[serde(default)]
    pub header: Option<String>,

    /// Row label (table cells)
    #[serde(default)]
    pub row_label: Option<String>,

    /// Column label (table cells), usually carries the period and units
    #[serde(default)]
    pub column_label: Option<String>,

    /// Unit annotation found near the fragment (e.g. "£m", "$'000")
    #[serde(default)]
    pub unit_hint: Option<String>,
}

/// One parsed span of document content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub id: String,
    pub kind: FragmentKind,
    pub raw_text: String,

    /// Numeric value parsed upstream (table cells)
    #[serde(default)]
    pub value: Option<Decimal>,

    pub page: u32,
    pub section: SectionType,

    #[serde(default)]
    pub context: FragmentContext,
}

// ============================================================================
// Canonical metrics
// ============================================================================

/// Canonical metric identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricId {
    Revenue,
    CostOfSales,
    GrossProfit,
    OperatingExpenses,
    OperatingProfit,
    Ebitda,
    AdjustedEbitda,
    NetIncome,
    TotalDebt,
    NetDebt,
    Cash,
    TotalAssets,
    CurrentAssets,
    NonCurrentAssets,
    TotalLiabilities,
    CurrentLiabilities,
    NonCurrentLiabilities,
    TotalEquity,
    OperatingCashFlow,
    FreeCashFlow,
    Employees,
    EbitdaMargin,
}

impl MetricId {
    pub const ALL: [MetricId; 22] = [
        MetricId::Revenue,
        MetricId::CostOfSales,
        MetricId::GrossProfit,
        MetricId::OperatingExpenses,
        MetricId::OperatingProfit,
        MetricId::Ebitda,
        MetricId::AdjustedEbitda,
        MetricId::NetIncome,
        MetricId::TotalDebt,
        MetricId::NetDebt,
        MetricId::Cash,
        MetricId::TotalAssets,
        MetricId::CurrentAssets,
        MetricId::NonCurrentAssets,
        MetricId::TotalLiabilities,
        MetricId::CurrentLiabilities,
        MetricId::NonCurrentLiabilities,
        MetricId::TotalEquity,
        MetricId::OperatingCashFlow,
        MetricId::FreeCashFlow,
        MetricId::Employees,
        MetricId::EbitdaMargin,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricId::Revenue => "REVENUE",
            MetricId::CostOfSales => "COST_OF_SALES",
            MetricId::GrossProfit => "GROSS_PROFIT",
            MetricId::OperatingExpenses => "OPERATING_EXPENSES",
            MetricId::OperatingProfit => "OPERATING_PROFIT",
            MetricId::Ebitda => "EBITDA",
            MetricId::AdjustedEbitda => "ADJUSTED_EBITDA",
            MetricId::NetIncome => "NET_INCOME",
            MetricId::TotalDebt => "TOTAL_DEBT",
            MetricId::NetDebt => "NET_DEBT",
            MetricId::Cash => "CASH",
            MetricId::TotalAssets => "TOTAL_ASSETS",
            MetricId::CurrentAssets => "CURRENT_ASSETS",
            MetricId::NonCurrentAssets => "NON_CURRENT_ASSETS",
            MetricId::TotalLiabilities => "TOTAL_LIABILITIES",
            MetricId::CurrentLiabilities => "CURRENT_LIABILITIES",
            MetricId::NonCurrentLiabilities => "NON_CURRENT_LIABILITIES",
            MetricId::TotalEquity => "TOTAL_EQUITY",
            MetricId::OperatingCashFlow => "OPERATING_CASH_FLOW",
            MetricId::FreeCashFlow => "FREE_CASH_FLOW",
            MetricId::Employees => "EMPLOYEES",
            MetricId::EbitdaMargin => "EBITDA_MARGIN",
        }
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        MetricId::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| format!("Unknown metric: {}", s))
    }
}

/// Declared value domain of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueDomain {
    Monetary,
    Ratio,
    Count,
}

/// Sign of a closure term
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermSign {
    Add,
    Subtract,
}

fn default_term_sign() -> TermSign {
    TermSign::Add
}

/// One constituent of an arithmetic closure rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosureTerm {
    pub metric: MetricId,
    #[serde(default = "default_term_sign")]
    pub sign: TermSign,
}

impl ClosureTerm {
    pub fn add(metric: MetricId) -> Self {
        Self { metric, sign: TermSign::Add }
    }

    pub fn subtract(metric: MetricId) -> Self {
        Self { metric, sign: TermSign::Subtract }
    }
}

/// Registry entry for a canonical metric
///
/// `min`/`max` are in base units (base currency units for monetary metrics).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub id: MetricId,
    pub display_name: String,
    pub domain: ValueDomain,
    pub min: Decimal,
    pub max: Decimal,

    /// Sections where this metric is normally reported
    #[serde(default)]
    pub expected_sections: Vec<SectionType>,

    /// Subtotal definition; empty when the metric is not a subtotal
    #[serde(default)]
    pub closure: Vec<ClosureTerm>,

    /// A move from positive to negative is worth flagging (profit to loss)
    #[serde(default)]
    pub sign_sensitive: bool,
}

// ============================================================================
// Periods
// ============================================================================

/// Reporting period granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeriodKind {
    FiscalYear,
    HalfYear,
    Quarter,
}

/// Parsed reporting period
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeriodSpec {
    pub kind: PeriodKind,
    pub start: NaiveDate,
    pub end: NaiveDate,

    /// Fiscal year the period belongs to (year of the period end)
    pub fiscal_year: i32,

    /// Half (1-2) or quarter (1-4) number; None for full years
    pub index: Option<u8>,
}

impl PeriodSpec {
    pub fn key(&self) -> PeriodKey {
        PeriodKey {
            end: self.end,
            kind: self.kind,
        }
    }
}

impl fmt::Display for PeriodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.index) {
            (PeriodKind::FiscalYear, _) => write!(f, "FY{}", self.fiscal_year),
            (PeriodKind::HalfYear, Some(i)) => write!(f, "H{}-{}", i, self.end.year()),
            (PeriodKind::Quarter, Some(i)) => write!(f, "Q{}-{}", i, self.end.year()),
            (_, None) => write!(f, "{}", self.end),
        }
    }
}

/// Grouping key for candidates of the same reporting period
///
/// Orders oldest period first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeriodKey {
    pub end: NaiveDate,
    pub kind: PeriodKind,
}

impl PeriodKey {
    /// Same kind of period, ending in the same month one year before `later`
    pub fn is_year_before(&self, later: &PeriodKey) -> bool {
        self.kind == later.kind
            && self.end.year() == later.end.year() - 1
            && self.end.month() == later.end.month()
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// Why a candidate was generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationReason {
    PrimaryStatementLine,
    NoteCrossReference,
    SupplementaryTable,
    NarrativeMention,
}

impl GenerationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationReason::PrimaryStatementLine => "primary-statement-line",
            GenerationReason::NoteCrossReference => "note-cross-reference",
            GenerationReason::SupplementaryTable => "supplementary-table",
            GenerationReason::NarrativeMention => "narrative-mention",
        }
    }
}

/// Location used for "most recently reported" tie-breaks
///
/// `section_rank` is the order in which the fragment's section type first
/// appears in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentPosition {
    pub page: u32,
    pub section_rank: u32,
}

/// Which dimensions were read from the document rather than defaulted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExplicitDimensions {
    pub period: bool,
    pub currency: bool,
    pub scale: bool,
}

/// Everything needed to build a Candidate
#[derive(Debug, Clone)]
pub struct CandidateDraft {
    pub id: String,
    pub metric: MetricId,
    pub period: PeriodSpec,
    pub value: Decimal,
    pub currency: Option<String>,
    pub scale: String,
    pub fragment_ids: Vec<String>,
    pub provenance: String,
    pub confidence: Confidence,
    pub reason: GenerationReason,
    pub source_kind: FragmentKind,
    pub section: SectionType,
    pub position: DocumentPosition,
    pub evidence: String,
    pub explicit: ExplicitDimensions,
}

/// One proposed observation of a metric for a period
///
/// Only constructible through [`Candidate::new`], which converts the value to
/// base units; a candidate that cannot be normalized never exists.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    id: String,
    metric: MetricId,
    period: PeriodSpec,
    value: Decimal,
    currency: Option<String>,
    scale: String,
    normalized_value: Decimal,
    fragment_ids: Vec<String>,
    provenance: String,
    confidence: Confidence,
    reason: GenerationReason,
    source_kind: FragmentKind,
    section: SectionType,
    position: DocumentPosition,
    evidence: String,
    explicit: ExplicitDimensions,
}

impl Candidate {
    /// Build a candidate, normalizing its value into base units
    ///
    /// # Arguments
    /// * `draft` - Raw candidate attributes
    /// * `normalizer` - Unit normalizer holding rate and scale tables
    /// * `domain` - Value domain of the draft's metric
    ///
    /// # Returns
    /// * `UnitError` when currency or scale cannot be converted
    pub fn new(
        draft: CandidateDraft,
        normalizer: &UnitNormalizer,
        domain: ValueDomain,
    ) -> Result<Self, UnitError> {
        let currency = match domain {
            ValueDomain::Monetary => {
                let code = draft.currency.ok_or(UnitError::MissingCurrency)?;
                Some(code.trim().to_ascii_uppercase())
            }
            ValueDomain::Ratio | ValueDomain::Count => None,
        };

        let scale = normalizer.canonical_scale(&draft.scale)?;
        let normalized_value = normalizer.normalize_at(
            draft.value,
            currency.as_deref(),
            &scale,
            Some(draft.period.end),
        )?;

        Ok(Self {
            id: draft.id,
            metric: draft.metric,
            period: draft.period,
            value: draft.value,
            currency,
            scale,
            normalized_value,
            fragment_ids: draft.fragment_ids,
            provenance: draft.provenance,
            confidence: draft.confidence.clamp(0.0, 1.0),
            reason: draft.reason,
            source_kind: draft.source_kind,
            section: draft.section,
            position: draft.position,
            evidence: draft.evidence,
            explicit: draft.explicit,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn metric(&self) -> MetricId {
        self.metric
    }

    pub fn period(&self) -> &PeriodSpec {
        &self.period
    }

    /// Value as reported, before currency and scale conversion
    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn currency(&self) -> Option<&str> {
        self.currency.as_deref()
    }

    /// Canonical scale name ("actual", "thousands", ...)
    pub fn scale(&self) -> &str {
        &self.scale
    }

    /// Value in base units
    pub fn normalized_value(&self) -> Decimal {
        self.normalized_value
    }

    pub fn fragment_ids(&self) -> &[String] {
        &self.fragment_ids
    }

    pub fn provenance(&self) -> &str {
        &self.provenance
    }

    pub fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub fn reason(&self) -> GenerationReason {
        self.reason
    }

    pub fn source_kind(&self) -> FragmentKind {
        self.source_kind
    }

    pub fn section(&self) -> SectionType {
        self.section
    }

    pub fn position(&self) -> DocumentPosition {
        self.position
    }

    pub fn evidence(&self) -> &str {
        &self.evidence
    }

    pub fn explicit(&self) -> ExplicitDimensions {
        self.explicit
    }

    /// Reported unit combination, e.g. ("GBP", "millions")
    pub fn unit_combination(&self) -> (Option<&str>, &str) {
        (self.currency.as_deref(), self.scale.as_str())
    }
}

// ============================================================================
// Verdicts
// ============================================================================

/// Deterministic rule identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleName {
    UnitConsistency,
    RangeCheck,
    ArithmeticClosure,
    YoyPlausibility,
}

impl RuleName {
    pub fn as_str(self) -> &'static str {
        match self {
            RuleName::UnitConsistency => "unit-consistency",
            RuleName::RangeCheck => "range-check",
            RuleName::ArithmeticClosure => "arithmetic-closure",
            RuleName::YoyPlausibility => "yoy-plausibility",
        }
    }

    /// Importance of the rule
    pub fn severity(self) -> Severity {
        match self {
            RuleName::RangeCheck => Severity::Critical,
            RuleName::UnitConsistency | RuleName::ArithmeticClosure => Severity::Major,
            RuleName::YoyPlausibility => Severity::Minor,
        }
    }
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one rule on one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictOutcome {
    Pass,
    Warning,
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Major,
    Minor,
}

/// Result of one rule evaluated against one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub candidate_id: String,
    pub rule: RuleName,
    pub outcome: VerdictOutcome,
    pub severity: Severity,
    pub message: String,
}

impl Verdict {
    pub fn new(
        candidate: &Candidate,
        rule: RuleName,
        outcome: VerdictOutcome,
        message: impl Into<String>,
    ) -> Self {
        Self {
            candidate_id: candidate.id().to_string(),
            rule,
            outcome,
            severity: rule.severity(),
            message: message.into(),
        }
    }

    pub fn pass(candidate: &Candidate, rule: RuleName, message: impl Into<String>) -> Self {
        Self::new(candidate, rule, VerdictOutcome::Pass, message)
    }

    pub fn warning(candidate: &Candidate, rule: RuleName, message: impl Into<String>) -> Self {
        Self::new(candidate, rule, VerdictOutcome::Warning, message)
    }

    pub fn fail(candidate: &Candidate, rule: RuleName, message: impl Into<String>) -> Self {
        Self::new(candidate, rule, VerdictOutcome::Fail, message)
    }

    pub fn is_fail(&self) -> bool {
        self.outcome == VerdictOutcome::Fail
    }
}

// ============================================================================
// Resolutions
// ============================================================================

/// How a resolution was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMethod {
    AutoUnique,
    AutoRanked,
    RuleTiebreak,
    Adjudicated,
    AdjudicatedFallback,
    Unresolved,
}

impl ResolutionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ResolutionMethod::AutoUnique => "auto-unique",
            ResolutionMethod::AutoRanked => "auto-ranked",
            ResolutionMethod::RuleTiebreak => "rule-tiebreak",
            ResolutionMethod::Adjudicated => "adjudicated",
            ResolutionMethod::AdjudicatedFallback => "adjudicated-fallback",
            ResolutionMethod::Unresolved => "unresolved",
        }
    }
}

impl fmt::Display for ResolutionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why no value could be chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnresolvedReason {
    NoCandidates,
    AllFailedValidation,
    AdjudicationUnavailable,
}

impl UnresolvedReason {
    pub fn describe(self) -> &'static str {
        match self {
            UnresolvedReason::NoCandidates => "no candidates found",
            UnresolvedReason::AllFailedValidation => "all candidates failed validation",
            UnresolvedReason::AdjudicationUnavailable => "adjudication unavailable",
        }
    }
}

/// Final decision for one (metric, period) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub metric: MetricId,

    /// None only for target metrics when the document yielded no period at all
    pub period: Option<PeriodSpec>,

    pub chosen_candidate: Option<String>,

    /// Chosen candidate's normalized value (base units)
    pub value: Option<Decimal>,

    pub confidence: Option<Confidence>,
    pub method: ResolutionMethod,
    pub rationale: String,
    pub unresolved_reason: Option<UnresolvedReason>,

    /// Identifiers of every candidate in the group
    pub considered: Vec<String>,

    pub resolved_at: DateTime<Utc>,
}

/// Comparable view of a resolution without its timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionDecision<'a> {
    pub metric: MetricId,
    pub period: Option<&'a PeriodSpec>,
    pub chosen_candidate: Option<&'a str>,
    pub value: Option<Decimal>,
    pub confidence: Option<Confidence>,
    pub method: ResolutionMethod,
    pub rationale: &'a str,
    pub unresolved_reason: Option<UnresolvedReason>,
    pub considered: &'a [String],
}

impl Resolution {
    /// Build a resolution that selects `candidate`
    pub fn chosen(
        candidate: &Candidate,
        confidence: Confidence,
        method: ResolutionMethod,
        rationale: impl Into<String>,
        considered: Vec<String>,
    ) -> Self {
        Self {
            metric: candidate.metric(),
            period: Some(candidate.period().clone()),
            chosen_candidate: Some(candidate.id().to_string()),
            value: Some(candidate.normalized_value()),
            confidence: Some(confidence.clamp(0.0, 1.0)),
            method,
            rationale: rationale.into(),
            unresolved_reason: None,
            considered,
            resolved_at: Utc::now(),
        }
    }

    /// Build a terminal unresolved record
    pub fn unresolved(
        metric: MetricId,
        period: Option<PeriodSpec>,
        reason: UnresolvedReason,
        rationale: impl Into<String>,
        considered: Vec<String>,
    ) -> Self {
        Self {
            metric,
            period,
            chosen_candidate: None,
            value: None,
            confidence: None,
            method: ResolutionMethod::Unresolved,
            rationale: rationale.into(),
            unresolved_reason: Some(reason),
            considered,
            resolved_at: Utc::now(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.chosen_candidate.is_some()
    }

    pub fn period_label(&self) -> String {
        self.period
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string())
    }

    pub fn decision(&self) -> ResolutionDecision<'_> {
        ResolutionDecision {
            metric: self.metric,
            period: self.period.as_ref(),
            chosen_candidate: self.chosen_candidate.as_deref(),
            value: self.value,
            confidence: self.confidence,
            method: self.method,
            rationale: &self.rationale,
            unresolved_reason: self.unresolved_reason,
            considered: &self.considered,
        }
    }
}

// ============================================================================
// Run inputs
// ============================================================================

/// Document-level fallbacks for dimensions missing from a fragment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentDefaults {
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub scale: Option<String>,

    /// Period label applied when a fragment carries none (e.g. "FY2023")
    #[serde(default)]
    pub period: Option<String>,
}

/// One document's resolution request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolutionRequest {
    pub document_id: String,
    pub fragments: Vec<Fragment>,

    /// Restrict generation to these metrics; None resolves every metric found
    #[serde(default)]
    pub target_metrics: Option<Vec<MetricId>>,

    /// Overrides for the configured document defaults
    #[serde(default)]
    pub defaults: Option<DocumentDefaults>,
}

impl ResolutionRequest {
    pub fn new(document_id: impl Into<String>, fragments: Vec<Fragment>) -> Self {
        Self {
            document_id: document_id.into(),
            fragments,
            target_metrics: None,
            defaults: None,
        }
    }

    pub fn with_targets(mut self, targets: Vec<MetricId>) -> Self {
        self.target_metrics = Some(targets);
        self
    }

    pub fn with_defaults(mut self, defaults: DocumentDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }
}

/// Resolved values visible to later groups, keyed by metric and period
///
/// Built between dependency tiers and shared read-only.
#[derive(Debug, Clone, Default)]
pub struct ResolvedLedger {
    values: HashMap<(MetricId, PeriodKey), Decimal>,
}

impl ResolvedLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, metric: MetricId, period: PeriodKey) -> Option<Decimal> {
        self.values.get(&(metric, period)).copied()
    }

    pub fn insert(&mut self, metric: MetricId, period: PeriodKey, value: Decimal) {
        self.values.insert((metric, period), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Copy of this ledger extended with every resolved value in `resolutions`
    pub fn extended_with(&self, resolutions: &[Resolution]) -> Self {
        let mut next = self.clone();
        for resolution in resolutions {
            if let (Some(period), Some(value)) = (&resolution.period, resolution.value) {
                next.insert(resolution.metric, period.key(), value);
            }
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_id_round_trips_through_str() {
        for metric in MetricId::ALL {
            assert_eq!(metric.as_str().parse::<MetricId>().unwrap(), metric);
        }
        assert_eq!("net-debt".parse::<MetricId>().unwrap(), MetricId::NetDebt);
        assert!("UNKNOWN_THING".parse::<MetricId>().is_err());
    }

    #[test]
    fn test_metric_id_serde_uses_screaming_snake_case() {
        let json = serde_json::to_string(&MetricId::NonCurrentAssets).unwrap();
        assert_eq!(json, "\"NON_CURRENT_ASSETS\"");
    }

    #[test]
    fn test_unknown_section_maps_to_other() {
        let section: SectionType = serde_json::from_str("\"directors_report\"").unwrap();
        assert_eq!(section, SectionType::Other);
    }

    #[test]
    fn test_period_keys_order_oldest_first() {
        let older = PeriodKey {
            end: NaiveDate::from_ymd_opt(2022, 12, 31).unwrap(),
            kind: PeriodKind::FiscalYear,
        };
        let newer = PeriodKey {
            end: NaiveDate::from_ymd_opt(2023, 6, 30).unwrap(),
            kind: PeriodKind::HalfYear,
        };
        assert!(older < newer);
    }

    #[test]
    fn test_fragment_deserializes_with_minimal_fields() {
        let json = r#"{"id":"f1","kind":"text","raw_text":"Revenue was £5m","page":3,
            "section":"narrative"}"#;
        let fragment: Fragment = serde_json::from_str(json).unwrap();
        assert_eq!(fragment.kind, FragmentKind::Text);
        assert!(fragment.value.is_none());
        assert!(fragment.context.header.is_none());
    }
}
