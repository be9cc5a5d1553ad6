//! Per-document resolution workflow
//!
//! Drives every (metric, period) group through the pipeline:
//! 1. Generate candidates from fragments
//! 2. Group by metric and period
//! 3. Validate each group against the deterministic rules
//! 4. Adjudicate the survivors into one Resolution
//!
//! Metrics are processed in dependency tiers so that subtotal closure checks
//! see their constituents' resolved values. Growth rates and ratios are
//! derived from the resolved figures afterwards.

pub mod derived;
pub mod orchestrator;
pub mod report;

pub use derived::{derive_metrics, DerivedMetric, DerivedMetricId};
pub use orchestrator::{DocumentResolution, ResolutionOrchestrator};
pub use report::render_report;
