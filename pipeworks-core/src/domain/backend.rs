//! Backend connection domain types

use serde::{Deserialize, Serialize};

use crate::dto::backend::BackendConnectionInfo;

/// Routing key of a backend connection
///
/// Assigned from the ordering the backends themselves report, never from
/// local insertion order.
pub type BackendIndex = usize;

/// An independently addressable backend service that may host pipelines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConnection {
    /// Routing key used by every pipeline-scoped request
    pub index: BackendIndex,

    /// Base URL of the backend (e.g., "http://localhost:9099")
    pub base_url: String,
}

impl BackendConnection {
    /// Creates a connection, trimming any trailing slash from the base URL
    pub fn new(index: BackendIndex, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            index,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl From<BackendConnectionInfo> for BackendConnection {
    fn from(info: BackendConnectionInfo) -> Self {
        Self::new(info.idx, info.url)
    }
}

impl std::fmt::Display for BackendConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}", self.index, self.base_url)
    }
}
