//! In-memory backend used by the registry tests
//!
//! Behaves like a pipeline backend bound to one connection and records every
//! call it receives, so tests can assert which backends were contacted.

use async_trait::async_trait;
use pipeworks_client::{ClientError, PipelineArtifact, PipelineBackend, Result};
use pipeworks_core::domain::backend::{BackendConnection, BackendIndex};
use pipeworks_core::domain::valve::ValveParameters;
use pipeworks_core::dto::model::ModelInfo;
use pipeworks_core::dto::pipeline::{PipelineSummary, UpdatePipeline};
use pipeworks_core::error::ErrorDetail;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use crate::registry::BackendRegistry;

struct FakePipeline {
    summary: PipelineSummary,
    models: Vec<ModelInfo>,
    valves: ValveParameters,
}

#[derive(Default)]
struct FakeState {
    pipelines: BTreeMap<String, FakePipeline>,
    calls: Vec<String>,
    unreachable: bool,
    /// Listing never answers
    stalled: bool,
    /// Mutations never answer
    mutations_stalled: bool,
    /// Error returned by every listing
    listing_error: Option<ClientError>,
    failing_models: BTreeSet<String>,
    /// Extra raw listing entries, returned as-is
    foreign_entries: Vec<PipelineSummary>,
}

pub struct FakeBackend {
    connection: BackendConnection,
    state: Mutex<FakeState>,
}

fn summary(id: &str, idx: Option<BackendIndex>) -> PipelineSummary {
    PipelineSummary {
        id: id.to_string(),
        name: Some(format!("{} pipeline", id)),
        description: None,
        pipeline_type: Some("pipe".to_string()),
        priority: None,
        idx,
        source: None,
        created_at: None,
    }
}

impl FakeBackend {
    pub fn new(index: BackendIndex, base_url: &str) -> Arc<Self> {
        Arc::new(Self {
            connection: BackendConnection {
                index,
                base_url: base_url.to_string(),
            },
            state: Mutex::new(FakeState::default()),
        })
    }

    /// Seeds an installed pipeline exposing `models`
    pub fn with_pipeline(self: &Arc<Self>, id: &str, models: &[&str]) -> Arc<Self> {
        let models = models
            .iter()
            .map(|m| ModelInfo {
                id: m.to_string(),
                name: Some(m.to_uppercase()),
            })
            .collect();
        self.state.lock().unwrap().pipelines.insert(
            id.to_string(),
            FakePipeline {
                summary: summary(id, Some(self.connection.index)),
                models,
                valves: ValveParameters::new(),
            },
        );
        Arc::clone(self)
    }

    /// Adds a raw listing entry claiming to belong to `idx`
    pub fn with_foreign_entry(self: &Arc<Self>, id: &str, idx: BackendIndex) -> Arc<Self> {
        self.state
            .lock()
            .unwrap()
            .foreign_entries
            .push(summary(id, Some(idx)));
        Arc::clone(self)
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    pub fn set_stalled(&self, stalled: bool) {
        self.state.lock().unwrap().stalled = stalled;
    }

    pub fn set_mutations_stalled(&self, stalled: bool) {
        self.state.lock().unwrap().mutations_stalled = stalled;
    }

    pub fn fail_listing_with(&self, err: ClientError) {
        self.state.lock().unwrap().listing_error = Some(err);
    }

    pub fn fail_models_for(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_models
            .insert(id.to_string());
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn has_pipeline(&self, id: &str) -> bool {
        self.state.lock().unwrap().pipelines.contains_key(id)
    }

    /// Never resolves while the matching stall flag is set
    async fn stall(&self, mutation: bool) {
        let stalled = {
            let state = self.state.lock().unwrap();
            if mutation {
                state.mutations_stalled
            } else {
                state.stalled
            }
        };
        if stalled {
            std::future::pending::<()>().await;
        }
    }

    fn enter(&self, call: String) -> Result<std::sync::MutexGuard<'_, FakeState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if state.unreachable {
            return Err(ClientError::NetworkUnreachable(format!(
                "{} did not respond",
                self.connection.base_url
            )));
        }
        Ok(state)
    }

    fn install(&self, state: &mut FakeState, id: String) -> Result<PipelineSummary> {
        if state.pipelines.contains_key(&id) {
            return Err(ClientError::DuplicateId(ErrorDetail::Message(format!(
                "Pipeline {} already exists",
                id
            ))));
        }
        let installed = summary(&id, Some(self.connection.index));
        state.pipelines.insert(
            id.clone(),
            FakePipeline {
                summary: installed.clone(),
                models: vec![ModelInfo {
                    id: id.clone(),
                    name: None,
                }],
                valves: ValveParameters::new(),
            },
        );
        Ok(installed)
    }

    fn not_found(id: &str) -> ClientError {
        ClientError::NotFound(ErrorDetail::Message(format!("Pipeline {} not found", id)))
    }
}

/// `https://host/path/summarizer.py` -> `summarizer`
fn stem(name: &str) -> String {
    let last = name.rsplit('/').next().unwrap_or(name);
    last.trim_end_matches(".py").to_string()
}

#[async_trait]
impl PipelineBackend for FakeBackend {
    fn connection(&self) -> &BackendConnection {
        &self.connection
    }

    async fn list_pipelines(&self) -> Result<Vec<PipelineSummary>> {
        self.stall(false).await;
        let state = self.enter("list".to_string())?;
        if let Some(err) = &state.listing_error {
            return Err(err.clone());
        }
        let mut listed: Vec<_> = state
            .pipelines
            .values()
            .map(|p| p.summary.clone())
            .collect();
        listed.extend(state.foreign_entries.iter().cloned());
        Ok(listed)
    }

    async fn get_pipeline(&self, id: &str) -> Result<PipelineSummary> {
        let state = self.enter(format!("get:{}", id))?;
        state
            .pipelines
            .get(id)
            .map(|p| p.summary.clone())
            .ok_or_else(|| Self::not_found(id))
    }

    async fn install_from_url(&self, source_url: &str) -> Result<PipelineSummary> {
        self.stall(true).await;
        let mut state = self.enter(format!("install_url:{}", source_url))?;
        if source_url.contains("invalid") {
            return Err(ClientError::RemoteRejected {
                status: 400,
                detail: ErrorDetail::from("Invalid manifest"),
            });
        }
        self.install(&mut state, stem(source_url))
    }

    async fn install_from_file(&self, artifact: PipelineArtifact) -> Result<PipelineSummary> {
        self.stall(true).await;
        let mut state = self.enter(format!("install_file:{}", artifact.filename()))?;
        let (filename, bytes) = artifact.into_parts();
        if !bytes.starts_with(b"class Pipeline") {
            return Err(ClientError::InvalidArtifact(ErrorDetail::Structured(
                json!({"file": filename, "error": "no Pipeline class"}),
            )));
        }
        self.install(&mut state, stem(&filename))
    }

    async fn update_pipeline(&self, id: &str, update: &UpdatePipeline) -> Result<PipelineSummary> {
        self.stall(true).await;
        let mut state = self.enter(format!("update:{}", id))?;
        let pipeline = state
            .pipelines
            .get_mut(id)
            .ok_or_else(|| Self::not_found(id))?;
        if let Some(name) = &update.name {
            pipeline.summary.name = Some(name.clone());
        }
        if let Some(description) = &update.description {
            pipeline.summary.description = Some(description.clone());
        }
        if let Some(priority) = update.priority {
            pipeline.summary.priority = Some(priority);
        }
        Ok(pipeline.summary.clone())
    }

    async fn delete_pipeline(&self, id: &str) -> Result<()> {
        self.stall(true).await;
        let mut state = self.enter(format!("delete:{}", id))?;
        state
            .pipelines
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Self::not_found(id))
    }

    async fn get_models(&self, id: &str) -> Result<Vec<ModelInfo>> {
        let state = self.enter(format!("models:{}", id))?;
        if state.failing_models.contains(id) {
            return Err(ClientError::RemoteRejected {
                status: 500,
                detail: ErrorDetail::from("pipeline crashed while loading"),
            });
        }
        state
            .pipelines
            .get(id)
            .map(|p| p.models.clone())
            .ok_or_else(|| Self::not_found(id))
    }

    async fn get_valves(&self, id: &str) -> Result<ValveParameters> {
        let state = self.enter(format!("get_valves:{}", id))?;
        state
            .pipelines
            .get(id)
            .map(|p| p.valves.clone())
            .ok_or_else(|| Self::not_found(id))
    }

    async fn set_valves(
        &self,
        id: &str,
        parameters: &ValveParameters,
    ) -> Result<Option<ValveParameters>> {
        self.stall(true).await;
        let mut state = self.enter(format!("set_valves:{}", id))?;
        let pipeline = state
            .pipelines
            .get_mut(id)
            .ok_or_else(|| Self::not_found(id))?;

        let too_hot = parameters
            .get("temperature")
            .and_then(|t| t.as_f64())
            .is_some_and(|t| t > 2.0);
        if too_hot {
            return Err(ClientError::RemoteRejected {
                status: 400,
                detail: ErrorDetail::Structured(
                    json!([{"loc": ["temperature"], "msg": "must be <= 2"}]),
                ),
            });
        }

        pipeline.valves = parameters.clone();
        Ok(Some(parameters.clone()))
    }
}

/// Registry over the given fakes
pub fn registry(backends: &[Arc<FakeBackend>]) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    for backend in backends {
        registry.register(backend.clone()).unwrap();
    }
    registry
}
