//! Valve endpoints
//!
//! Valves are sent and received as opaque JSON objects. Updates replace the
//! whole bag; there is no patch form and no concurrency token.

use pipeworks_core::domain::valve::ValveParameters;
use tracing::debug;

use crate::BackendClient;
use crate::error::{ClientError, Result};

impl BackendClient {
    /// Fetch the current valves of a pipeline
    pub async fn get_valves(&self, id: &str) -> Result<ValveParameters> {
        let url = self.pipeline_url(id, &["valves"])?;
        let response = self.client.get(url).query(&self.query()).send().await?;

        self.handle_optional_object(response)
            .await?
            .ok_or_else(|| ClientError::ParseError("Empty valves response".to_string()))
    }

    /// Replace the valves of a pipeline
    ///
    /// # Returns
    /// The bag echoed by the backend, or `None` when it answers with an empty body
    pub async fn set_valves(
        &self,
        id: &str,
        parameters: &ValveParameters,
    ) -> Result<Option<ValveParameters>> {
        let url = self.pipeline_url(id, &["valves"])?;
        debug!(
            "Replacing {} valve(s) of {} on backend {}",
            parameters.len(),
            id,
            self.index()
        );
        let response = self
            .client
            .post(url)
            .query(&self.query())
            .json(parameters)
            .send()
            .await?;

        self.handle_optional_object(response).await
    }
}
