//! Backend connection registry
//!
//! Maps backend index to the backend reached under it. Read-mostly: it is
//! built once per session (from configuration or a gateway listing) and then
//! shared behind an `Arc` by every concurrent operation.

use pipeworks_client::{BackendClient, PipelineBackend};
use pipeworks_core::domain::backend::{BackendConnection, BackendIndex};
use reqwest::Client;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

/// Registered backends, ordered by index
#[derive(Clone, Default)]
pub struct BackendRegistry {
    backends: BTreeMap<BackendIndex, Arc<dyn PipelineBackend>>,
}

impl BackendRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry of HTTP backends sharing one HTTP client
    pub fn from_connections(
        connections: impl IntoIterator<Item = BackendConnection>,
        client: &Client,
    ) -> Result<Self> {
        let mut registry = Self::new();
        for connection in connections {
            registry.register_http(connection, client)?;
        }
        Ok(registry)
    }

    /// Builds a registry from a gateway's connection listing
    ///
    /// Indices are taken verbatim from the gateway, so they match the
    /// ordering the backends themselves report.
    pub async fn discover(gateway_url: &str, client: &Client) -> Result<Self> {
        let gateway = BackendClient::with_client(BackendConnection::new(0, gateway_url), client.clone());
        let listed = gateway.list_connections().await?;
        info!("Gateway {} reported {} backend(s)", gateway.base_url(), listed.len());

        Self::from_connections(listed.into_iter().map(BackendConnection::from), client)
    }

    /// Registers a backend under the index of its connection
    ///
    /// # Errors
    /// - `DuplicateIndex` if the index is taken
    /// - `InvalidBackendUrl` if the base URL is not http(s)
    pub fn register(&mut self, backend: Arc<dyn PipelineBackend>) -> Result<()> {
        let connection = backend.connection();
        let index = connection.index;

        if !(connection.base_url.starts_with("http://")
            || connection.base_url.starts_with("https://"))
        {
            return Err(PipelineError::InvalidBackendUrl(connection.base_url.clone()));
        }

        if self.backends.contains_key(&index) {
            return Err(PipelineError::DuplicateIndex(index));
        }

        debug!("Registered backend {}", connection);
        self.backends.insert(index, backend);
        Ok(())
    }

    /// Registers an HTTP backend for `connection`
    pub fn register_http(&mut self, connection: BackendConnection, client: &Client) -> Result<()> {
        self.register(Arc::new(BackendClient::with_client(connection, client.clone())))
    }

    /// Resolves an index to its base URL
    pub fn resolve(&self, index: BackendIndex) -> Result<&str> {
        self.backends
            .get(&index)
            .map(|backend| backend.connection().base_url.as_str())
            .ok_or(PipelineError::UnknownBackend(index))
    }

    /// Backend registered under `index`
    pub fn backend(&self, index: BackendIndex) -> Result<Arc<dyn PipelineBackend>> {
        self.backends
            .get(&index)
            .cloned()
            .ok_or(PipelineError::UnknownBackend(index))
    }

    /// Registered connections in ascending index order
    pub fn connections(&self) -> impl Iterator<Item = &BackendConnection> {
        self.backends.values().map(|backend| backend.connection())
    }

    pub(crate) fn backends(&self) -> impl Iterator<Item = &Arc<dyn PipelineBackend>> {
        self.backends.values()
    }

    pub fn indices(&self) -> impl Iterator<Item = BackendIndex> + '_ {
        self.backends.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl std::fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.connections()).finish()
    }
}
