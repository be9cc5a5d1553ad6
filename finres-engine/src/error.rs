//! Error types for the resolution engine

use thiserror::Error;

/// Top-level failures of a resolution run
///
/// Per-fragment and per-candidate problems never reach this type; they are
/// contained as skips, verdicts or unresolved resolutions.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Document has no fragments to work on
    #[error("Document {0} contains no fragments")]
    EmptyDocument(String),

    /// Metric registry missing or empty
    #[error("Metric registry is empty; at least one metric definition is required")]
    MissingRegistry,

    /// Configuration loading or validation failure
    #[error("Configuration error: {0}")]
    Config(String),

    /// Worker task failure
    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<finres_common::Error> for ResolveError {
    fn from(err: finres_common::Error) -> Self {
        ResolveError::Config(err.to_string())
    }
}

/// Unit conversion failures
///
/// Raised while normalizing a candidate value; the offending fragment is skipped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UnitError {
    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("Unknown scale: {0}")]
    UnknownScale(String),

    #[error("Monetary value has no currency")]
    MissingCurrency,

    #[error("Value out of range after conversion")]
    Overflow,
}

/// Reasoning service failures
///
/// All variants are caught by the adjudicator and lead to the fallback path.
#[derive(Debug, Error)]
pub enum ReasoningError {
    #[error("Reasoning call timed out after {0} ms")]
    Timeout(u64),

    #[error("Malformed reasoning reply: {0}")]
    Malformed(String),

    #[error("Reasoning transport error: {0}")]
    Transport(String),

    #[error("No reasoning service configured")]
    Unavailable,
}

impl From<reqwest::Error> for ReasoningError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ReasoningError::Transport(format!("request timed out: {}", err))
        } else {
            ReasoningError::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ResolveError>;
