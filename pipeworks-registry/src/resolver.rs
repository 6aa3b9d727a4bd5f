//! Model resolver
//!
//! Derives the callable-model catalog from a set of pipeline records. Each
//! record's models are fetched from that record's own backend; a pipeline
//! with the same id on another backend is never consulted. The result is a
//! pure function of the input records and is recomputed on every refresh.

use pipeworks_core::domain::backend::BackendIndex;
use pipeworks_core::domain::model::ModelEntry;
use pipeworks_core::domain::pipeline::{PipelineKey, PipelineRecord};
use pipeworks_core::dto::model::ModelInfo;
use std::collections::{BTreeMap, BTreeSet};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{PipelineError, TargetFailure};
use crate::registry::BackendRegistry;

/// Models derived from a pipeline set
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    /// Ordered and unique by (backend index, pipeline id, model id)
    pub models: Vec<ModelEntry>,
    /// Pipelines whose descriptor query failed
    pub failures: Vec<TargetFailure>,
}

impl ModelCatalog {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Models exposed by one pipeline
    pub fn of(&self, key: &PipelineKey) -> impl Iterator<Item = &ModelEntry> {
        self.models
            .iter()
            .filter(move |m| m.backend_index == key.backend_index && m.pipeline_id == key.id)
    }
}

/// Derive the model catalog of `records`
///
/// One descriptor query per distinct record, all concurrent. A failing
/// query is reported in `failures` and does not discard other results.
pub async fn derive_models(registry: &BackendRegistry, records: &[PipelineRecord]) -> ModelCatalog {
    let mut pending = BTreeSet::new();
    let mut failures = Vec::new();
    let mut tasks = JoinSet::new();

    for record in records {
        let key = record.key();
        if !pending.insert(key.clone()) {
            continue;
        }

        match registry.backend(key.backend_index) {
            Ok(backend) => {
                let display_name = record.display_name.clone();
                tasks.spawn(async move {
                    let result = backend.get_models(&key.id).await;
                    (key, display_name, result)
                });
            }
            Err(err) => {
                pending.remove(&key);
                failures.push(TargetFailure::pipeline(key, err));
            }
        }
    }

    let mut models: BTreeMap<(BackendIndex, String, String), ModelEntry> = BTreeMap::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((key, display_name, Ok(infos))) => {
                pending.remove(&key);
                debug!("Pipeline {} exposes {} model(s)", key, infos.len());
                for info in infos {
                    let entry = model_entry(&key, &display_name, info);
                    models
                        .entry((
                            entry.backend_index,
                            entry.pipeline_id.clone(),
                            entry.model_id.clone(),
                        ))
                        .or_insert(entry);
                }
            }
            Ok((key, _, Err(err))) => {
                pending.remove(&key);
                warn!("Failed to resolve models of {}: {}", key, err);
                failures.push(TargetFailure::pipeline(key, err));
            }
            Err(e) => warn!("Model query task ended abnormally: {}", e),
        }
    }

    for key in pending {
        failures.push(TargetFailure::pipeline(
            key,
            PipelineError::Interrupted("model query did not complete".to_string()),
        ));
    }
    failures.sort_by(|a, b| a.target.cmp(&b.target));

    ModelCatalog {
        models: models.into_values().collect(),
        failures,
    }
}

/// A model without a reported name takes the pipeline's name when it is the
/// pipeline itself, otherwise its own id
fn model_entry(key: &PipelineKey, pipeline_name: &str, info: ModelInfo) -> ModelEntry {
    let display_name = match info.name.filter(|name| !name.trim().is_empty()) {
        Some(name) => name,
        None if info.id == key.id => pipeline_name.to_string(),
        None => info.id.clone(),
    };

    ModelEntry {
        model_id: info.id,
        pipeline_id: key.id.clone(),
        backend_index: key.backend_index,
        display_name,
    }
}
