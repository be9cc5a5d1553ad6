//! Unit, period and label normalization
//!
//! Leaf components with no dependency on the rest of the pipeline.

pub mod labels;
pub mod periods;
pub mod units;

pub use labels::{normalize_label, LabelStandardizer};
pub use periods::{find_year_in_text, parse_period_label, parse_period_label_with};
pub use units::UnitNormalizer;
