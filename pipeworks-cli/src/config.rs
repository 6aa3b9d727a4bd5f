//! Configuration module
//!
//! Resolves which backends the CLI talks to and how long each request may
//! take. Backends are either listed explicitly as `INDEX=URL` pairs or
//! discovered from a gateway.

use anyhow::{Context, Result, bail};
use pipeworks_client::build_http_client;
use pipeworks_core::domain::backend::BackendConnection;
use pipeworks_registry::BackendRegistry;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

/// CLI configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit backend connections
    pub backends: Vec<BackendConnection>,
    /// Gateway that reports the backend connections
    pub gateway_url: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

/// Parse a single `INDEX=URL` backend
pub fn parse_backend(s: &str) -> Result<BackendConnection> {
    let (index, url) = s
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("invalid INDEX=URL: no `=` found in `{}`", s))?;
    let index = index
        .trim()
        .parse()
        .with_context(|| format!("invalid backend index `{}`", index))?;
    Ok(BackendConnection::new(index, url.trim()))
}

fn is_http(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

impl Config {
    /// Check the configuration before any request is made
    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            bail!("Timeout must be greater than zero");
        }

        match &self.gateway_url {
            Some(_) if !self.backends.is_empty() => {
                bail!("Use either --gateway or --backend, not both")
            }
            Some(url) if !is_http(url) => {
                bail!("Invalid gateway URL '{}': must start with http:// or https://", url)
            }
            Some(_) => return Ok(()),
            None => {}
        }

        if self.backends.is_empty() {
            bail!("No backends configured: pass --backend INDEX=URL or --gateway URL");
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            if !is_http(&backend.base_url) {
                bail!(
                    "Invalid URL for backend {}: '{}' must start with http:// or https://",
                    backend.index,
                    backend.base_url
                );
            }
            if !seen.insert(backend.index) {
                bail!("Backend index {} is configured more than once", backend.index);
            }
        }

        Ok(())
    }

    /// Build the backend registry, asking the gateway when one is configured
    pub async fn build_registry(&self) -> Result<BackendRegistry> {
        self.validate()?;
        let client = build_http_client(self.timeout)?;

        let registry = match &self.gateway_url {
            Some(url) => BackendRegistry::discover(url, &client)
                .await
                .with_context(|| format!("Failed to discover backends from {}", url))?,
            None => BackendRegistry::from_connections(self.backends.iter().cloned(), &client)?,
        };

        debug!("Using backends {:?}", registry);
        Ok(registry)
    }
}
