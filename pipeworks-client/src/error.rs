//! Error types for the pipeworks client

use pipeworks_core::error::ErrorDetail;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when talking to a backend connection
///
/// Errors are cloneable so that per-target failures can be collected into
/// reports without holding on to transport internals.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The backend did not respond (connection refused, DNS, timeout, ...)
    #[error("Backend unreachable: {0}")]
    NetworkUnreachable(String),

    /// The backend answered with an application-level failure
    #[error("Backend rejected the request (status {status}): {detail}")]
    RemoteRejected {
        /// HTTP status code
        status: u16,
        /// Detail from the response body, kept verbatim
        detail: ErrorDetail,
    },

    /// Pipeline (or endpoint) not present on this backend
    #[error("Not found: {0}")]
    NotFound(ErrorDetail),

    /// The pipeline id already exists on this backend
    #[error("Pipeline id already installed on this backend: {0}")]
    DuplicateId(ErrorDetail),

    /// An uploaded artifact failed validation or execution on the backend
    #[error("Invalid pipeline artifact: {0}")]
    InvalidArtifact(ErrorDetail),

    /// The request was rejected locally before reaching the network
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The backend answered with a body that could not be decoded
    #[error("Failed to parse response: {0}")]
    ParseError(String),
}

impl ClientError {
    /// Create an API error from status code and raw response body
    pub fn api_error(status: u16, body: &str) -> Self {
        let detail = ErrorDetail::from_body(status, body);
        match status {
            404 => Self::NotFound(detail),
            409 => Self::DuplicateId(detail),
            _ => Self::RemoteRejected { status, detail },
        }
    }

    /// Like [`ClientError::api_error`], but validation failures on an upload
    /// are reported as [`ClientError::InvalidArtifact`]
    pub fn upload_error(status: u16, body: &str) -> Self {
        match status {
            400 | 422 => Self::InvalidArtifact(ErrorDetail::from_body(status, body)),
            _ => Self::api_error(status, body),
        }
    }

    /// Detail reported by the backend, if any
    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            Self::RemoteRejected { detail, .. }
            | Self::NotFound(detail)
            | Self::DuplicateId(detail)
            | Self::InvalidArtifact(detail) => Some(detail),
            _ => None,
        }
    }

    /// Check if this error is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if the backend could not be reached at all
    ///
    /// Unreachable is not the same as absent: callers must not treat the
    /// pipelines of an unreachable backend as deleted.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::NetworkUnreachable(_))
    }

    /// Check if this error is a client error (4xx status)
    pub fn is_client_error(&self) -> bool {
        match self {
            Self::RemoteRejected { status, .. } => (400..500).contains(status),
            Self::NotFound(_) | Self::DuplicateId(_) | Self::InvalidArtifact(_) => true,
            _ => false,
        }
    }

    /// Check if this error is a server error (5xx status)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::RemoteRejected { status, .. } if *status >= 500)
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::ParseError(err.to_string())
        } else if err.is_builder() {
            Self::InvalidRequest(err.to_string())
        } else {
            Self::NetworkUnreachable(err.to_string())
        }
    }
}
