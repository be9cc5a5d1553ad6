//! finres-engine library interface
//!
//! Candidate Resolution Engine: turns document fragments into one trusted,
//! traceable value per (metric, period).

pub mod adjudication;
pub mod candidates;
pub mod config;
pub mod context;
pub mod error;
pub mod normalize;
pub mod registry;
pub mod types;
pub mod validators;
pub mod workflow;

pub use crate::config::EngineConfig;
pub use crate::context::ResolutionContext;
pub use crate::error::{ReasoningError, ResolveError, Result, UnitError};
pub use crate::types::{
    Candidate, Fragment, MetricId, Resolution, ResolutionMethod, ResolutionRequest, Verdict,
};
pub use crate::workflow::{DocumentResolution, ResolutionOrchestrator};
