//! Model domain types

use serde::{Deserialize, Serialize};

use super::backend::BackendIndex;
use super::pipeline::PipelineKey;

/// A callable model exposed by an installed pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub model_id: String,
    pub pipeline_id: String,
    pub backend_index: BackendIndex,
    pub display_name: String,
}

impl ModelEntry {
    /// Key of the pipeline this model belongs to
    pub fn pipeline_key(&self) -> PipelineKey {
        PipelineKey::new(self.backend_index, self.pipeline_id.clone())
    }

    /// Identity used for de-duplication: (backend index, pipeline id, model id)
    pub fn identity(&self) -> (BackendIndex, &str, &str) {
        (self.backend_index, &self.pipeline_id, &self.model_id)
    }
}
