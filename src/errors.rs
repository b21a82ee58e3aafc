// Copyright (c) 2025 - Cowboy AI, Inc.
//! Error types for pod manager operations
//!
//! Each sub-domain owns its error enum; [`PodmError`] aggregates them for
//! callers that cross module boundaries.

use thiserror::Error;

use crate::allocation::{AllocationError, PersistenceError, TaskError};
use crate::config::ConfigError;
use crate::crawler::ConsumerError;
use crate::events::DeliveryError;
use crate::layers::LayerError;
use crate::state_machine::TransitionError;
use crate::tagging::TagError;
use crate::unification::{PatternSetError, PatternSyntaxError, UnificationError};

/// Errors that can occur anywhere in the pod manager
#[derive(Debug, Error)]
pub enum PodmError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("pattern syntax error: {0}")]
    PatternSyntax(#[from] PatternSyntaxError),

    #[error("pattern set error: {0}")]
    PatternSet(#[from] PatternSetError),

    #[error("unification error: {0}")]
    Unification(#[from] UnificationError),

    #[error("tag error: {0}")]
    Tags(#[from] TagError),

    #[error("layer error: {0}")]
    Layer(#[from] LayerError),

    #[error("allocation error: {0}")]
    Allocation(#[from] AllocationError),

    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("assembly task error: {0}")]
    Task(#[from] TaskError),

    #[error("state transition error: {0}")]
    Transition(#[from] TransitionError),

    #[error("consumer error: {0}")]
    Consumer(#[from] ConsumerError),

    #[error("event delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for pod manager operations
pub type PodmResult<T> = Result<T, PodmError>;

impl PodmError {
    /// Status code for the REST surface
    pub fn http_status(&self) -> u16 {
        match self {
            PodmError::Allocation(e) => e.http_status(),
            PodmError::Layer(LayerError::UnknownService(_)) => 404,
            PodmError::Layer(LayerError::Transport { .. }) => 502,
            PodmError::Layer(LayerError::Backend(_)) => 503,
            PodmError::Serialization(_) => 400,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_allocation_status_passes_through() {
        let err: PodmError = AllocationError::NodeNotFound(Uuid::nil()).into();
        assert_eq!(err.http_status(), 404);
    }

    #[test]
    fn test_question_mark_conversion() {
        fn parse() -> PodmResult<serde_json::Value> {
            Ok(serde_json::from_str("{")?)
        }
        let err = parse().unwrap_err();
        assert!(matches!(err, PodmError::Serialization(_)));
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn test_backend_setup_failure_is_unavailable_not_bad_payload() {
        let err: PodmError = LayerError::Backend("Failed to create HTTP client: tls".into()).into();
        assert!(matches!(err, PodmError::Layer(LayerError::Backend(_))));
        assert_eq!(err.http_status(), 503);
    }
}
