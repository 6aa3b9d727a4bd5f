//! Pipeworks HTTP Client
//!
//! A small, type-safe HTTP client for the pipeline REST surface exposed by a
//! single backend connection.
//!
//! One [`BackendClient`] is bound to exactly one backend connection and
//! attaches that connection's index (`urlIdx`) to every pipeline-scoped
//! request. Fan-out across several backends lives in `pipeworks-registry`,
//! which talks to backends through the [`PipelineBackend`] trait.
//!
//! # Example
//!
//! ```no_run
//! use pipeworks_client::BackendClient;
//! use pipeworks_core::domain::backend::BackendConnection;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), pipeworks_client::ClientError> {
//!     let client = BackendClient::new(BackendConnection::new(0, "http://localhost:9099"));
//!
//!     for pipeline in client.list_pipelines().await? {
//!         println!("{}", pipeline.id);
//!     }
//!     Ok(())
//! }
//! ```

mod backend;
pub mod error;
mod models;
mod pipelines;
mod valves;

// Re-export commonly used types
pub use backend::{PipelineArtifact, PipelineBackend};
pub use error::{ClientError, Result};

use pipeworks_core::domain::backend::{BackendConnection, BackendIndex};
use pipeworks_core::domain::valve::ValveParameters;
use pipeworks_core::dto::pipeline::BackendQuery;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;

/// HTTP client for one backend connection
///
/// Endpoints are organized into logical groups:
/// - Pipeline management (list, install, update, delete)
/// - Model descriptors
/// - Valve configuration
#[derive(Debug, Clone)]
pub struct BackendClient {
    /// The backend this client is bound to
    connection: BackendConnection,
    /// HTTP client instance
    client: Client,
}

/// Build the shared HTTP client used for every backend
///
/// A single attempt is made per request; `timeout` bounds that attempt.
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ClientError::InvalidRequest(format!("Failed to build HTTP client: {}", e)))
}

impl BackendClient {
    /// Create a new backend client
    ///
    /// # Arguments
    /// * `connection` - The backend connection to bind to
    pub fn new(connection: BackendConnection) -> Self {
        Self::with_client(connection, Client::new())
    }

    /// Create a new backend client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    /// The same `Client` can be shared by the clients of every backend.
    pub fn with_client(connection: BackendConnection, client: Client) -> Self {
        let connection = BackendConnection::new(connection.index, connection.base_url);
        Self { connection, client }
    }

    /// Get the base URL of the backend
    pub fn base_url(&self) -> &str {
        &self.connection.base_url
    }

    /// Get the backend index this client routes to
    pub fn index(&self) -> BackendIndex {
        self.connection.index
    }

    pub fn connection(&self) -> &BackendConnection {
        &self.connection
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.connection.base_url, path)
    }

    /// URL of a pipeline-scoped resource, with `id` encoded as one path segment
    ///
    /// Ids are opaque, so `/`, `?` and `#` inside one must not leak into the
    /// path, query or fragment.
    fn pipeline_url(&self, id: &str, tail: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.url("/api/v1/pipelines")).map_err(|e| {
            ClientError::InvalidRequest(format!("Invalid backend URL '{}': {}", self.base_url(), e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                ClientError::InvalidRequest(format!(
                    "Backend URL '{}' cannot carry a path",
                    self.base_url()
                ))
            })?
            .push(id)
            .extend(tail);
        Ok(url)
    }

    fn query(&self) -> BackendQuery {
        BackendQuery {
            url_idx: self.connection.index,
        }
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::api_error(status.as_u16(), &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an upload response; validation failures become `InvalidArtifact`
    async fn handle_upload_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::upload_error(status.as_u16(), &error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }

    /// Handle an API response that returns no content (e.g., DELETE operations)
    ///
    /// This method checks the status code and returns an error if the request failed.
    async fn handle_empty_response(&self, response: reqwest::Response) -> Result<()> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClientError::api_error(status.as_u16(), &error_text));
        }

        Ok(())
    }

    /// Handle a response whose body is either empty or a JSON object
    async fn handle_optional_object(
        &self,
        response: reqwest::Response,
    ) -> Result<Option<ValveParameters>> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(ClientError::api_error(status.as_u16(), &body));
        }

        if body.trim().is_empty() {
            return Ok(None);
        }

        match serde_json::from_str::<JsonValue>(&body) {
            Ok(JsonValue::Object(map)) => Ok(Some(map)),
            Ok(JsonValue::Null) => Ok(None),
            Ok(other) => Err(ClientError::ParseError(format!(
                "Expected a JSON object, got {}",
                other
            ))),
            Err(e) => Err(ClientError::ParseError(format!(
                "Failed to parse JSON response: {}",
                e
            ))),
        }
    }
}
