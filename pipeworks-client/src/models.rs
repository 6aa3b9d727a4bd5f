//! Model descriptor endpoints

use pipeworks_core::dto::DataEnvelope;
use pipeworks_core::dto::model::ModelInfo;

use crate::BackendClient;
use crate::error::Result;

impl BackendClient {
    /// Get the models a pipeline exposes on this backend
    ///
    /// Filter-style pipelines expose no models and return an empty list.
    pub async fn get_models(&self, id: &str) -> Result<Vec<ModelInfo>> {
        let url = self.pipeline_url(id, &["models"])?;
        let response = self.client.get(url).query(&self.query()).send().await?;

        let envelope: DataEnvelope<ModelInfo> = self.handle_response(response).await?;
        Ok(envelope.into_inner())
    }
}
