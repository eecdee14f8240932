//! Error types for the pause decision engine.

use thiserror::Error;

/// Errors raised while reading resources or pause state.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The pause state annotation is present but is not a valid record.
    #[error("Malformed pause state: {0}")]
    MalformedState(#[source] serde_json::Error),

    /// The pause state decoded but breaks the paused/snapshot invariants.
    #[error("Inconsistent pause state: {0}")]
    InvalidState(String),

    /// A `status.conditions` entry could not be parsed.
    #[error("Malformed condition at index {index}: {source}")]
    MalformedCondition {
        /// Position in the conditions list.
        index: usize,
        /// Parse error.
        #[source]
        source: serde_json::Error,
    },

    /// The document does not have the shape of a resource.
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Encoding a value failed.
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
