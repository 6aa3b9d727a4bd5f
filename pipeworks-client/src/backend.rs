//! Backend abstraction
//!
//! The registry talks to backends only through [`PipelineBackend`], one
//! instance per backend connection. [`BackendClient`] is the HTTP
//! implementation.

use async_trait::async_trait;
use pipeworks_core::domain::backend::BackendConnection;
use pipeworks_core::domain::valve::ValveParameters;
use pipeworks_core::dto::model::ModelInfo;
use pipeworks_core::dto::pipeline::{PipelineSummary, UpdatePipeline};
use pipeworks_core::error::ErrorDetail;

use crate::BackendClient;
use crate::error::{ClientError, Result};

/// A single pipeline artifact to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineArtifact {
    filename: String,
    bytes: Vec<u8>,
}

impl PipelineArtifact {
    /// Create an artifact, rejecting empty names and empty content
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Result<Self> {
        let filename = filename.into();
        if filename.trim().is_empty() {
            return Err(ClientError::InvalidArtifact(ErrorDetail::from(
                "Artifact filename cannot be empty",
            )));
        }
        if bytes.is_empty() {
            return Err(ClientError::InvalidArtifact(ErrorDetail::Message(format!(
                "Artifact '{}' is empty",
                filename
            ))));
        }
        Ok(Self { filename, bytes })
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_parts(self) -> (String, Vec<u8>) {
        (self.filename, self.bytes)
    }
}

/// Pipeline operations against one backend connection
///
/// Every method targets the connection returned by [`PipelineBackend::connection`]
/// and nothing else.
#[async_trait]
pub trait PipelineBackend: Send + Sync {
    /// The connection this backend is bound to
    fn connection(&self) -> &BackendConnection;

    /// List the pipelines installed on this backend
    async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>>;

    /// Get one pipeline
    async fn get_pipeline(&self, id: &str) -> Result<PipelineSummary>;

    /// Install a pipeline fetched by the backend from `source_url`
    async fn install_from_url(&self, source_url: &str) -> Result<PipelineSummary>;

    /// Install a pipeline from an uploaded artifact
    async fn install_from_file(&self, artifact: PipelineArtifact) -> Result<PipelineSummary>;

    /// Update pipeline metadata
    async fn update_pipeline(&self, id: &str, update: &UpdatePipeline) -> Result<PipelineSummary>;

    /// Delete one pipeline
    async fn delete_pipeline(&self, id: &str) -> Result<()>;

    /// Models exposed by one pipeline
    async fn get_models(&self, id: &str) -> Result<Vec<ModelInfo>>;

    /// Current valves of one pipeline
    async fn get_valves(&self, id: &str) -> Result<ValveParameters>;

    /// Replace the valves of one pipeline
    async fn set_valves(
        &self,
        id: &str,
        parameters: &ValveParameters,
    ) -> Result<Option<ValveParameters>>;
}

#[async_trait]
impl PipelineBackend for BackendClient {
    fn connection(&self) -> &BackendConnection {
        BackendClient::connection(self)
    }

    async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>> {
        BackendClient::list_pipelines(self).await
    }

    async fn get_pipeline(&self, id: &str) -> Result<PipelineSummary> {
        BackendClient::get_pipeline(self, id).await
    }

    async fn install_from_url(&self, source_url: &str) -> Result<PipelineSummary> {
        BackendClient::install_from_url(self, source_url).await
    }

    async fn install_from_file(&self, artifact: PipelineArtifact) -> Result<PipelineSummary> {
        BackendClient::install_from_file(self, artifact).await
    }

    async fn update_pipeline(&self, id: &str, update: &UpdatePipeline) -> Result<PipelineSummary> {
        BackendClient::update_pipeline(self, id, update).await
    }

    async fn delete_pipeline(&self, id: &str) -> Result<()> {
        BackendClient::delete_pipeline(self, id).await
    }

    async fn get_models(&self, id: &str) -> Result<Vec<ModelInfo>> {
        BackendClient::get_models(self, id).await
    }

    async fn get_valves(&self, id: &str) -> Result<ValveParameters> {
        BackendClient::get_valves(self, id).await
    }

    async fn set_valves(
        &self,
        id: &str,
        parameters: &ValveParameters,
    ) -> Result<Option<ValveParameters>> {
        BackendClient::set_valves(self, id, parameters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_validation() {
        assert!(matches!(
            PipelineArtifact::new("", b"x".to_vec()),
            Err(ClientError::InvalidArtifact(_))
        ));
        assert!(matches!(
            PipelineArtifact::new("p.py", Vec::new()),
            Err(ClientError::InvalidArtifact(_))
        ));

        let artifact = PipelineArtifact::new("p.py", b"class Pipeline: pass".to_vec()).unwrap();
        assert_eq!(artifact.filename(), "p.py");
        assert_eq!(artifact.len(), 20);
        assert!(!artifact.is_empty());
    }

    #[test]
    fn test_client_is_a_pipeline_backend() {
        let client = BackendClient::new(BackendConnection::new(4, "http://b4"));
        let backend: &dyn PipelineBackend = &client;
        assert_eq!(backend.connection().index, 4);
    }
}
