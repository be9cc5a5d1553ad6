//! Engine configuration
//!
//! Loaded once per process from TOML (see `finres_common::config` for path
//! resolution). Every section has built-in defaults so a partial file, or no
//! file at all, yields a working engine. Tables are data only.

use crate::error::ResolveError;
use crate::registry;
use crate::types::{DocumentDefaults, MetricDefinition, MetricId};
use chrono::NaiveDate;
use finres_common::config::LoggingConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Root of the engine TOML file
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub normalization: NormalizationConfig,

    /// Extra label mappings, consulted alongside the built-in table
    #[serde(default)]
    pub labels: Vec<LabelMapping>,

    /// Metric registry; built-in definitions when the key is absent
    #[serde(default = "registry::builtin_definitions")]
    pub metrics: Vec<MetricDefinition>,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub validation: ValidationConfig,

    #[serde(default)]
    pub adjudication: AdjudicationConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default = "default_document_defaults")]
    pub defaults: DocumentDefaults,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            normalization: NormalizationConfig::default(),
            labels: Vec::new(),
            metrics: registry::builtin_definitions(),
            scoring: ScoringConfig::default(),
            validation: ValidationConfig::default(),
            adjudication: AdjudicationConfig::default(),
            pipeline: PipelineConfig::default(),
            defaults: default_document_defaults(),
        }
    }
}

impl EngineConfig {
    /// Load from an optional path, falling back to built-in defaults
    pub fn load(path: Option<&Path>) -> Result<Self, ResolveError> {
        let config: EngineConfig = finres_common::config::load_or_default(path)?;
        Ok(config)
    }

    /// Parse from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self, ResolveError> {
        toml::from_str(content).map_err(|e| ResolveError::Config(e.to_string()))
    }
}

fn default_document_defaults() -> DocumentDefaults {
    DocumentDefaults {
        currency: Some("GBP".to_string()),
        scale: Some("millions".to_string()),
        period: None,
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Number formatting convention used when parsing amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NumberLocale {
    /// 1,234.5
    #[default]
    #[serde(rename = "1,234.5", alias = "point")]
    PointDecimal,

    /// 1.234,5
    #[serde(rename = "1.234,5", alias = "comma")]
    CommaDecimal,
}

/// One currency conversion rate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateEntry {
    pub from: String,
    pub to: String,
    pub rate: Decimal,

    /// Rate applies to periods ending on or after this date
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

impl RateEntry {
    pub fn new(from: &str, to: &str, rate: Decimal) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            rate,
            as_of: None,
        }
    }
}

/// Unit normalization settings
///
/// `scales` and `scale_aliases` extend the built-in tables; `rates`
/// replaces the built-in rate table when present.
#[derive(Debug, Clone, Deserialize)]
pub struct NormalizationConfig {
    #[serde(default = "default_base_currency")]
    pub base_currency: String,

    #[serde(default = "default_rates")]
    pub rates: Vec<RateEntry>,

    #[serde(default)]
    pub scales: BTreeMap<String, Decimal>,

    #[serde(default)]
    pub scale_aliases: BTreeMap<String, String>,

    #[serde(default)]
    pub number_locale: NumberLocale,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            base_currency: default_base_currency(),
            rates: default_rates(),
            scales: BTreeMap::new(),
            scale_aliases: BTreeMap::new(),
            number_locale: NumberLocale::default(),
        }
    }
}

fn default_base_currency() -> String {
    "GBP".to_string()
}

fn default_rates() -> Vec<RateEntry> {
    vec![
        RateEntry::new("USD", "GBP", Decimal::new(79, 2)),
        RateEntry::new("EUR", "GBP", Decimal::new(85, 2)),
        RateEntry::new("JPY", "GBP", Decimal::new(53, 4)),
        RateEntry::new("CHF", "GBP", Decimal::new(89, 2)),
        RateEntry::new("CAD", "GBP", Decimal::new(58, 2)),
        RateEntry::new("AUD", "GBP", Decimal::new(52, 2)),
        RateEntry::new("GBP", "USD", Decimal::new(127, 2)),
        RateEntry::new("GBP", "EUR", Decimal::new(118, 2)),
    ]
}

// ============================================================================
// Labels
// ============================================================================

/// Custom surface form for a canonical metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelMapping {
    pub pattern: String,
    pub metric: MetricId,
}

// ============================================================================
// Scoring
// ============================================================================

/// Weight and cap of one confidence component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentWeight {
    pub weight: f64,
    pub cap: f64,
}

impl ComponentWeight {
    pub const fn new(weight: f64, cap: f64) -> Self {
        Self { weight, cap }
    }
}

/// Candidate confidence scoring
///
/// Each component produces a raw score in [0, 1]; its contribution is
/// `min(weight * raw, cap)`. The sum is clamped to [0, 1].
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_source_weight")]
    pub source_type: ComponentWeight,

    #[serde(default = "default_minor_weight")]
    pub section_relevance: ComponentWeight,

    #[serde(default = "default_minor_weight")]
    pub period_specificity: ComponentWeight,

    #[serde(default = "default_minor_weight")]
    pub evidence_completeness: ComponentWeight,

    /// Raw source score of a text mention (table cells score 1.0)
    #[serde(default = "default_text_source_raw")]
    pub text_source_raw: f64,

    /// Raw section score for notes when notes are not an expected section
    #[serde(default = "default_notes_section_raw")]
    pub notes_section_raw: f64,

    /// Raw section score for any other section
    #[serde(default = "default_other_section_raw")]
    pub other_section_raw: f64,

    /// Raw period score when the period came from document defaults
    #[serde(default = "default_inferred_period_raw")]
    pub inferred_period_raw: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            source_type: default_source_weight(),
            section_relevance: default_minor_weight(),
            period_specificity: default_minor_weight(),
            evidence_completeness: default_minor_weight(),
            text_source_raw: default_text_source_raw(),
            notes_section_raw: default_notes_section_raw(),
            other_section_raw: default_other_section_raw(),
            inferred_period_raw: default_inferred_period_raw(),
        }
    }
}

fn default_source_weight() -> ComponentWeight {
    ComponentWeight::new(0.40, 0.40)
}

fn default_minor_weight() -> ComponentWeight {
    ComponentWeight::new(0.20, 0.20)
}

fn default_text_source_raw() -> f64 {
    0.5
}

fn default_notes_section_raw() -> f64 {
    0.5
}

fn default_other_section_raw() -> f64 {
    0.25
}

fn default_inferred_period_raw() -> f64 {
    0.25
}

// ============================================================================
// Validation
// ============================================================================

/// Deterministic rule tolerances
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Relative tolerance for two normalized values to count as equal
    #[serde(default = "default_unit_tolerance")]
    pub unit_tolerance: f64,

    /// Relative tolerance for subtotal closure
    #[serde(default = "default_closure_tolerance")]
    pub closure_tolerance: f64,

    /// Share of a range bound treated as "near the boundary"
    #[serde(default = "default_range_warning_margin")]
    pub range_warning_margin: f64,

    /// Largest plausible year-over-year change (5.0 = +500%)
    #[serde(default = "default_yoy_max_growth")]
    pub yoy_max_growth: f64,

    /// Smallest plausible year-over-year change (-0.9 = -90%)
    #[serde(default = "default_yoy_min_growth")]
    pub yoy_min_growth: f64,

    #[serde(default = "default_true")]
    pub warn_on_sign_flip: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            unit_tolerance: default_unit_tolerance(),
            closure_tolerance: default_closure_tolerance(),
            range_warning_margin: default_range_warning_margin(),
            yoy_max_growth: default_yoy_max_growth(),
            yoy_min_growth: default_yoy_min_growth(),
            warn_on_sign_flip: true,
        }
    }
}

fn default_unit_tolerance() -> f64 {
    0.01
}

fn default_closure_tolerance() -> f64 {
    0.05
}

fn default_range_warning_margin() -> f64 {
    0.05
}

fn default_yoy_max_growth() -> f64 {
    5.0
}

fn default_yoy_min_growth() -> f64 {
    -0.9
}

fn default_true() -> bool {
    true
}

// ============================================================================
// Adjudication
// ============================================================================

/// Conflict adjudication settings
#[derive(Debug, Clone, Deserialize)]
pub struct AdjudicationConfig {
    /// Reasoning service URL; adjudication calls are skipped when unset
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Environment variable holding the bearer token for `endpoint`
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Model name forwarded to the reasoning service
    #[serde(default)]
    pub model: Option<String>,

    /// Hard timeout for one reasoning call
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum concurrent reasoning calls
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Client-side request rate limit
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Minimum confidence gap for an auto-ranked decision
    #[serde(default = "default_confidence_margin")]
    pub confidence_margin: f64,

    /// Use the top-ranked candidate when the reasoning call fails
    #[serde(default = "default_true")]
    pub fallback_on_failure: bool,

    /// Multiplier applied to the confidence of a fallback decision
    #[serde(default = "default_fallback_confidence_penalty")]
    pub fallback_confidence_penalty: f64,
}

impl Default for AdjudicationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key_env: None,
            model: None,
            timeout_ms: default_timeout_ms(),
            max_concurrent: default_max_concurrent(),
            requests_per_second: default_requests_per_second(),
            confidence_margin: default_confidence_margin(),
            fallback_on_failure: true,
            fallback_confidence_penalty: default_fallback_confidence_penalty(),
        }
    }
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_max_concurrent() -> usize {
    4
}

fn default_requests_per_second() -> u32 {
    2
}

fn default_confidence_margin() -> f64 {
    0.15
}

fn default_fallback_confidence_penalty() -> f64 {
    0.5
}

// ============================================================================
// Pipeline
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Metrics resolved concurrently within a dependency tier
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

fn default_workers() -> usize {
    4
}
