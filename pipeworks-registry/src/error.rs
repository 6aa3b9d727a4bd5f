//! Registry error types

use pipeworks_client::ClientError;
use pipeworks_core::domain::backend::BackendIndex;
use pipeworks_core::domain::pipeline::{InvalidTransition, PipelineKey};
use thiserror::Error;

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by registry, catalog and valve operations
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    /// Failure reported by (or while reaching) a backend
    #[error(transparent)]
    Client(#[from] ClientError),

    /// No backend is registered under this index
    #[error("Backend {0} is not registered")]
    UnknownBackend(BackendIndex),

    /// A backend is already registered under this index
    #[error("Backend {0} is already registered")]
    DuplicateIndex(BackendIndex),

    /// Backend base URL is not http(s)
    #[error("Invalid backend URL '{0}': must start with http:// or https://")]
    InvalidBackendUrl(String),

    /// The pipeline was reinstalled or deleted after its valves were fetched
    #[error("Valves of {0} are stale: the pipeline was reinstalled or deleted")]
    StaleValves(PipelineKey),

    /// Valves must be fetched before they can be edited or saved
    #[error("Valves of {0} have not been fetched")]
    ValvesNotFetched(PipelineKey),

    /// Illegal pipeline lifecycle transition
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    /// A concurrent request ended without producing a result
    #[error("Request interrupted: {0}")]
    Interrupted(String),
}

impl PipelineError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Client(err) if err.is_unreachable())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Client(err) if err.is_not_found())
    }
}

/// What an isolated failure belongs to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Target {
    Backend(BackendIndex),
    Pipeline(PipelineKey),
}

impl Target {
    pub fn backend_index(&self) -> BackendIndex {
        match self {
            Target::Backend(index) => *index,
            Target::Pipeline(key) => key.backend_index,
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Target::Backend(index) => write!(f, "backend #{}", index),
            Target::Pipeline(key) => write!(f, "pipeline {}", key),
        }
    }
}

/// A `{target, error}` pair reported by a tolerant join
#[derive(Debug, Clone)]
pub struct TargetFailure {
    pub target: Target,
    pub error: PipelineError,
}

impl TargetFailure {
    pub fn backend(index: BackendIndex, error: impl Into<PipelineError>) -> Self {
        Self {
            target: Target::Backend(index),
            error: error.into(),
        }
    }

    pub fn pipeline(key: PipelineKey, error: impl Into<PipelineError>) -> Self {
        Self {
            target: Target::Pipeline(key),
            error: error.into(),
        }
    }
}

impl std::fmt::Display for TargetFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.target, self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_display_and_order() {
        let mut targets = vec![
            Target::Pipeline(PipelineKey::new(0, "b")),
            Target::Backend(1),
            Target::Backend(0),
        ];
        targets.sort();
        assert_eq!(targets[0], Target::Backend(0));
        assert_eq!(targets[2].to_string(), "pipeline b@0");
        assert_eq!(targets[2].backend_index(), 0);
    }

    #[test]
    fn test_failure_classification() {
        let failure = TargetFailure::backend(
            2,
            ClientError::NetworkUnreachable("connection refused".to_string()),
        );
        assert!(failure.error.is_unreachable());
        assert!(!failure.error.is_not_found());
        assert_eq!(
            failure.to_string(),
            "backend #2: Backend unreachable: connection refused"
        );
    }
}
