//! Pipeline-related API endpoints

use pipeworks_core::dto::DataEnvelope;
use pipeworks_core::dto::backend::BackendConnectionInfo;
use pipeworks_core::dto::pipeline::{DeletePipeline, InstallFromUrl, PipelineSummary, UpdatePipeline};
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::BackendClient;
use crate::backend::PipelineArtifact;
use crate::error::{ClientError, Result};

impl BackendClient {
    // =============================================================================
    // Discovery
    // =============================================================================

    /// List the backend connections known to a gateway
    ///
    /// The returned indices are the gateway's own ordering and are the
    /// routing keys for every later request.
    pub async fn list_connections(&self) -> Result<Vec<BackendConnectionInfo>> {
        let url = self.url("/api/v1/pipelines/list");
        debug!("Listing backend connections from {}", url);
        let response = self.client.get(&url).send().await?;

        let envelope: DataEnvelope<BackendConnectionInfo> = self.handle_response(response).await?;
        Ok(envelope.into_inner())
    }

    // =============================================================================
    // Pipeline Management
    // =============================================================================

    /// List all pipelines installed on this backend
    pub async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>> {
        let url = self.url("/api/v1/pipelines/");
        debug!("Listing pipelines on backend {}", self.index());
        let response = self.client.get(&url).query(&self.query()).send().await?;

        let envelope: DataEnvelope<PipelineSummary> = self.handle_response(response).await?;
        Ok(envelope.into_inner())
    }

    /// Get a pipeline by ID
    ///
    /// # Arguments
    /// * `id` - The pipeline id on this backend
    pub async fn get_pipeline(&self, id: &str) -> Result<PipelineSummary> {
        let url = self.pipeline_url(id, &[])?;
        let response = self.client.get(url).query(&self.query()).send().await?;

        self.handle_response(response).await
    }

    /// Instruct the backend to fetch and register a pipeline from a remote location
    ///
    /// # Arguments
    /// * `source_url` - Location of the pipeline source; must be http(s)
    ///
    /// # Returns
    /// The pipeline as registered by the backend
    pub async fn install_from_url(&self, source_url: &str) -> Result<PipelineSummary> {
        if !(source_url.starts_with("http://") || source_url.starts_with("https://")) {
            return Err(ClientError::InvalidRequest(format!(
                "Invalid URL provided: '{}'",
                source_url
            )));
        }

        let url = self.url("/api/v1/pipelines/add");
        let req = InstallFromUrl {
            url: source_url.to_string(),
            url_idx: self.index(),
        };
        debug!("Installing {} on backend {}", source_url, self.index());
        let response = self.client.post(&url).json(&req).send().await?;

        self.handle_response(response).await
    }

    /// Upload a single pipeline artifact for registration by the backend
    pub async fn install_from_file(&self, artifact: PipelineArtifact) -> Result<PipelineSummary> {
        let url = self.url("/api/v1/pipelines/upload");
        debug!(
            "Uploading {} ({} bytes) to backend {}",
            artifact.filename(),
            artifact.len(),
            self.index()
        );

        let (filename, bytes) = artifact.into_parts();
        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(filename))
            .text("urlIdx", self.index().to_string());
        let response = self.client.post(&url).multipart(form).send().await?;

        self.handle_upload_response(response).await
    }

    /// Update pipeline metadata (name, description, priority)
    pub async fn update_pipeline(
        &self,
        id: &str,
        update: &UpdatePipeline,
    ) -> Result<PipelineSummary> {
        let url = self.pipeline_url(id, &[])?;
        let response = self
            .client
            .post(url)
            .query(&self.query())
            .json(update)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Delete a pipeline from this backend only
    ///
    /// # Arguments
    /// * `id` - The pipeline id to delete
    pub async fn delete_pipeline(&self, id: &str) -> Result<()> {
        let url = self.url("/api/v1/pipelines/delete");
        let req = DeletePipeline {
            id: id.to_string(),
            url_idx: self.index(),
        };
        let response = self.client.delete(&url).json(&req).send().await?;

        self.handle_empty_response(response).await
    }
}
