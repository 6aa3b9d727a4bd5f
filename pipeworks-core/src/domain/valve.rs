//! Valve domain types
//!
//! Valves are runtime parameters owned by a single pipeline instance. Their
//! schema belongs to the pipeline implementation, so the bag is kept as an
//! opaque JSON object and never validated here.

use serde::{Deserialize, Serialize};

use super::backend::BackendIndex;
use super::pipeline::PipelineKey;

/// Opaque valve parameter bag
pub type ValveParameters = serde_json::Map<String, serde_json::Value>;

/// Valve configuration of one pipeline at one backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValveConfig {
    pub pipeline_id: String,
    pub backend_index: BackendIndex,
    pub parameters: ValveParameters,
}

impl ValveConfig {
    pub fn new(key: &PipelineKey, parameters: ValveParameters) -> Self {
        Self {
            pipeline_id: key.id.clone(),
            backend_index: key.backend_index,
            parameters,
        }
    }

    pub fn key(&self) -> PipelineKey {
        PipelineKey::new(self.backend_index, self.pipeline_id.clone())
    }
}
