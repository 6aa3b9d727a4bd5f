//! Valve configuration manager
//!
//! Valves are always read from the pipeline's own backend; nothing is cached
//! between calls. Saving replaces the whole parameter bag, with no diff and
//! no concurrency token, so the last writer wins.

use pipeworks_core::domain::pipeline::PipelineKey;
use pipeworks_core::domain::valve::{ValveConfig, ValveParameters};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::registry::BackendRegistry;

/// Fetch the current valves of one pipeline
pub async fn get_valves(registry: &BackendRegistry, key: &PipelineKey) -> Result<ValveConfig> {
    let backend = registry.backend(key.backend_index)?;
    let parameters = backend.get_valves(&key.id).await?;
    debug!("Fetched {} valve(s) of {}", parameters.len(), key);

    Ok(ValveConfig::new(key, parameters))
}

/// Replace the valves of one pipeline
///
/// Returns the bag the backend echoed back, or the one that was sent when
/// the backend answered with an empty body. A rejection carries the
/// backend's detail verbatim.
pub async fn set_valves(
    registry: &BackendRegistry,
    key: &PipelineKey,
    parameters: ValveParameters,
) -> Result<ValveConfig> {
    let backend = registry.backend(key.backend_index)?;
    let echoed = backend.set_valves(&key.id, &parameters).await?;
    info!("Valves updated: {}", key);

    Ok(ValveConfig::new(key, echoed.unwrap_or(parameters)))
}

/// State of a valve editing session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveState {
    /// Nothing fetched yet
    Unknown,
    /// Draft matches what the backend holds
    Fetched,
    /// Draft has local edits
    Dirty,
    /// Last fetch or save failed
    Error,
}

/// Edits the valves of one pipeline against a fetched baseline
#[derive(Debug, Clone)]
pub struct ValveEditor {
    key: PipelineKey,
    state: ValveState,
    config: Option<ValveConfig>,
    draft: ValveParameters,
    epoch: u64,
    last_error: Option<PipelineError>,
}

impl ValveEditor {
    pub fn new(key: PipelineKey) -> Self {
        Self::with_epoch(key, 0)
    }

    pub(crate) fn with_epoch(key: PipelineKey, epoch: u64) -> Self {
        Self {
            key,
            state: ValveState::Unknown,
            config: None,
            draft: ValveParameters::new(),
            epoch,
            last_error: None,
        }
    }

    pub fn key(&self) -> &PipelineKey {
        &self.key
    }

    pub fn state(&self) -> ValveState {
        self.state
    }

    pub fn is_dirty(&self) -> bool {
        self.state == ValveState::Dirty
    }

    /// Invalidation epoch of the pipeline when the session was opened
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Last bag confirmed by the backend
    pub fn config(&self) -> Option<&ValveConfig> {
        self.config.as_ref()
    }

    pub fn draft(&self) -> &ValveParameters {
        &self.draft
    }

    pub fn last_error(&self) -> Option<&PipelineError> {
        self.last_error.as_ref()
    }

    /// Fetch the baseline, discarding any local edits
    pub async fn fetch(&mut self, registry: &BackendRegistry) -> Result<&ValveConfig> {
        match get_valves(registry, &self.key).await {
            Ok(config) => {
                self.draft = config.parameters.clone();
                self.state = ValveState::Fetched;
                self.last_error = None;
                Ok(&*self.config.insert(config))
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Set one parameter in the draft
    pub fn set(&mut self, name: impl Into<String>, value: Value) -> Result<()> {
        self.ensure_fetched()?;
        self.draft.insert(name.into(), value);
        self.mark_edited();
        Ok(())
    }

    /// Remove one parameter from the draft
    pub fn remove(&mut self, name: &str) -> Result<Option<Value>> {
        self.ensure_fetched()?;
        let removed = self.draft.remove(name);
        self.mark_edited();
        Ok(removed)
    }

    /// Replace the whole draft
    pub fn replace_all(&mut self, parameters: ValveParameters) -> Result<()> {
        self.ensure_fetched()?;
        self.draft = parameters;
        self.mark_edited();
        Ok(())
    }

    /// Send the draft to the backend
    ///
    /// A session without edits is not sent. On failure the draft is kept and
    /// the session moves to `Error`, so the save can be retried.
    pub async fn save(&mut self, registry: &BackendRegistry) -> Result<ValveConfig> {
        self.ensure_fetched()?;
        if let (ValveState::Fetched, Some(config)) = (self.state, &self.config) {
            return Ok(config.clone());
        }

        match set_valves(registry, &self.key, self.draft.clone()).await {
            Ok(config) => {
                self.draft = config.parameters.clone();
                self.state = ValveState::Fetched;
                self.last_error = None;
                Ok(self.config.insert(config).clone())
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Moves the session to `Error`, handing the error back
    pub fn fail(&mut self, err: PipelineError) -> PipelineError {
        warn!("Valve session for {} failed: {}", self.key, err);
        self.state = ValveState::Error;
        self.last_error = Some(err.clone());
        err
    }

    fn ensure_fetched(&self) -> Result<()> {
        match self.config {
            Some(_) => Ok(()),
            None => Err(PipelineError::ValvesNotFetched(self.key.clone())),
        }
    }

    fn mark_edited(&mut self) {
        let unchanged = self
            .config
            .as_ref()
            .is_some_and(|config| config.parameters == self.draft);
        self.state = if unchanged && self.state != ValveState::Error {
            ValveState::Fetched
        } else {
            ValveState::Dirty
        };
    }
}
