//! Pipeline domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::backend::BackendIndex;
use crate::dto::pipeline::PipelineSummary;

/// Composite identity of a pipeline
///
/// The same pipeline id may exist on two backends; the two are different
/// pipelines. Ordering is by backend index, then id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PipelineKey {
    pub backend_index: BackendIndex,
    pub id: String,
}

impl PipelineKey {
    pub fn new(backend_index: BackendIndex, id: impl Into<String>) -> Self {
        Self {
            backend_index,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for PipelineKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.backend_index)
    }
}

/// How a pipeline was brought onto its backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[serde(alias = "url")]
    UrlFetch,
    #[serde(alias = "file", alias = "upload")]
    FileUpload,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::UrlFetch => write!(f, "url"),
            SourceType::FileUpload => write!(f, "file"),
        }
    }
}

/// A pipeline believed to be installed at a backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRecord {
    pub id: String,
    pub backend_index: BackendIndex,
    pub display_name: String,
    /// `None` when the backend listing does not report provenance
    pub source_type: Option<SourceType>,
    pub installed_at: DateTime<Utc>,
}

impl PipelineRecord {
    /// Builds a record from a backend response
    ///
    /// # Arguments
    /// * `summary` - The pipeline as reported by the backend
    /// * `backend_index` - The backend the response came from
    /// * `source_type` - Provenance known to the caller (install paths), preferred over the reported one
    /// * `observed_at` - Fallback timestamp when the backend reports none
    pub fn from_summary(
        summary: PipelineSummary,
        backend_index: BackendIndex,
        source_type: Option<SourceType>,
        observed_at: DateTime<Utc>,
    ) -> Self {
        let display_name = summary
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| summary.id.clone());

        Self {
            id: summary.id,
            backend_index,
            display_name,
            source_type: source_type.or(summary.source),
            installed_at: summary.created_at.unwrap_or(observed_at),
        }
    }

    pub fn key(&self) -> PipelineKey {
        PipelineKey::new(self.backend_index, self.id.clone())
    }
}

/// Lifecycle state of a single pipeline record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Uninstalled,
    Installing,
    Installed,
    Deleted,
}

/// Events that drive [`PipelineState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineEvent {
    Install,
    InstallSucceeded,
    InstallFailed,
    Delete,
}

/// Rejected lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: PipelineState,
    pub event: PipelineEvent,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot apply {:?} to a pipeline in state {:?}", self.event, self.from)
    }
}

impl std::error::Error for InvalidTransition {}

impl PipelineState {
    /// Applies an event, returning the next state
    ///
    /// A deleted pipeline may be installed again; that starts a new record.
    pub fn apply(self, event: PipelineEvent) -> Result<PipelineState, InvalidTransition> {
        use PipelineEvent::*;
        use PipelineState::*;

        match (self, event) {
            (Uninstalled | Deleted, Install) => Ok(Installing),
            (Installing, InstallSucceeded) => Ok(Installed),
            (Installing, InstallFailed) => Ok(Uninstalled),
            (Installed, Delete) => Ok(Deleted),
            (from, event) => Err(InvalidTransition { from, event }),
        }
    }
}
