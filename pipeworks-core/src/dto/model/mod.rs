//! Model descriptor DTOs

use serde::{Deserialize, Serialize};

/// One callable model reported by a pipeline's model descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
