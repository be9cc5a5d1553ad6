//! Read-only resolution context
//!
//! Built once from configuration and shared by `Arc` across every stage and
//! worker of a run.

use crate::config::{
    AdjudicationConfig, EngineConfig, NumberLocale, ScoringConfig, ValidationConfig,
};
use crate::error::ResolveError;
use crate::normalize::labels::LabelStandardizer;
use crate::normalize::units::UnitNormalizer;
use crate::registry::MetricRegistry;
use crate::types::DocumentDefaults;

#[derive(Debug, Clone)]
pub struct ResolutionContext {
    pub normalizer: UnitNormalizer,
    pub labels: LabelStandardizer,
    pub registry: MetricRegistry,
    pub scoring: ScoringConfig,
    pub validation: ValidationConfig,
    pub adjudication: AdjudicationConfig,
    pub number_locale: NumberLocale,
    pub defaults: DocumentDefaults,
    pub workers: usize,
}

impl ResolutionContext {
    /// Build the context, validating the metric registry
    pub fn from_config(config: &EngineConfig) -> Result<Self, ResolveError> {
        let registry = MetricRegistry::new(config.metrics.clone())?;

        if config.validation.unit_tolerance < 0.0 || config.validation.closure_tolerance < 0.0 {
            return Err(ResolveError::Config(
                "Validation tolerances must not be negative".to_string(),
            ));
        }
        if config.validation.yoy_min_growth > config.validation.yoy_max_growth {
            return Err(ResolveError::Config(format!(
                "yoy_min_growth {} exceeds yoy_max_growth {}",
                config.validation.yoy_min_growth, config.validation.yoy_max_growth
            )));
        }

        Ok(Self {
            normalizer: UnitNormalizer::from_config(&config.normalization),
            labels: LabelStandardizer::new(&config.labels),
            registry,
            scoring: config.scoring.clone(),
            validation: config.validation.clone(),
            adjudication: config.adjudication.clone(),
            number_locale: config.normalization.number_locale,
            defaults: config.defaults.clone(),
            workers: config.pipeline.workers.max(1),
        })
    }
}
