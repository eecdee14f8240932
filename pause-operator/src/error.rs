//! Error types for the pause operator.

use crate::store::{ResourceKey, StoreError};
use pause_core::CoreError;
use std::fmt;
use thiserror::Error;

/// Step of an evaluation that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationPhase {
    /// Reading the resource.
    Fetch,
    /// Decoding the pause state annotation.
    Decode,
    /// Running the decision engine.
    Decide,
    /// Writing the transition back.
    Mutate,
}

impl fmt::Display for EvaluationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Fetch => "fetch",
            Self::Decode => "decode",
            Self::Decide => "decide",
            Self::Mutate => "mutate",
        })
    }
}

/// Errors that can occur during operator operations.
#[derive(Debug, Error)]
pub enum OperatorError {
    /// The store failed to read or write the resource.
    #[error("Store error during {phase} of {resource}: {source}")]
    Transient {
        /// Resource being evaluated.
        resource: ResourceKey,
        /// Phase that failed.
        phase: EvaluationPhase,
        /// Underlying error.
        #[source]
        source: StoreError,
    },

    /// Every attempt lost an optimistic-concurrency race.
    #[error("Update conflict on {resource} after {attempts} attempts")]
    Conflict {
        /// Resource being evaluated.
        resource: ResourceKey,
        /// Attempts made.
        attempts: u32,
    },

    /// The pause state annotation is present but unreadable.
    #[error("Malformed pause state on {resource}: {source}")]
    MalformedState {
        /// Resource being evaluated.
        resource: ResourceKey,
        /// Decode error.
        #[source]
        source: CoreError,
    },

    /// The engine could not evaluate or apply a decision.
    #[error("Evaluation failed during {phase} of {resource}: {source}")]
    Decision {
        /// Resource being evaluated.
        resource: ResourceKey,
        /// Phase that failed.
        phase: EvaluationPhase,
        /// Engine error.
        #[source]
        source: CoreError,
    },

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl OperatorError {
    /// Phase the error was raised in, if it belongs to an evaluation.
    pub fn phase(&self) -> Option<EvaluationPhase> {
        match self {
            Self::Transient { phase, .. } | Self::Decision { phase, .. } => Some(*phase),
            Self::Conflict { .. } => Some(EvaluationPhase::Mutate),
            Self::MalformedState { .. } => Some(EvaluationPhase::Decode),
            Self::InvalidConfig(_) => None,
        }
    }

    /// Resource the error belongs to, if any.
    pub fn resource(&self) -> Option<&ResourceKey> {
        match self {
            Self::Transient { resource, .. }
            | Self::Conflict { resource, .. }
            | Self::MalformedState { resource, .. }
            | Self::Decision { resource, .. } => Some(resource),
            Self::InvalidConfig(_) => None,
        }
    }

    /// Whether retrying later with a fresh read can succeed.
    ///
    /// Malformed state and engine errors need the resource to change first.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Conflict { .. })
    }
}

/// Result type for operator operations.
pub type OperatorResult<T> = Result<T, OperatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> ResourceKey {
        ResourceKey::cluster_scoped("subnet-a")
    }

    #[test]
    fn phases() {
        let err = OperatorError::Conflict {
            resource: key(),
            attempts: 2,
        };
        assert_eq!(err.phase(), Some(EvaluationPhase::Mutate));
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Update conflict on subnet-a after 2 attempts");

        let err = OperatorError::MalformedState {
            resource: key(),
            source: CoreError::InvalidState("paused state has no snapshot".into()),
        };
        assert_eq!(err.phase(), Some(EvaluationPhase::Decode));
        assert!(!err.is_retryable());
        assert_eq!(err.resource(), Some(&key()));

        let err = OperatorError::InvalidConfig("kind is required".into());
        assert_eq!(err.phase(), None);
        assert_eq!(err.resource(), None);
    }

    #[test]
    fn transient_message_names_phase_and_resource() {
        let err = OperatorError::Transient {
            resource: ResourceKey::namespaced("crossplane-system", "bucket"),
            phase: EvaluationPhase::Fetch,
            source: StoreError::Unavailable("connection refused".into()),
        };
        assert_eq!(
            err.to_string(),
            "Store error during fetch of crossplane-system/bucket: Store unavailable: connection refused"
        );
        assert!(err.is_retryable());
    }
}
