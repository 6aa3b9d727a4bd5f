//! Backend DTOs

use serde::{Deserialize, Serialize};

use crate::domain::backend::BackendIndex;

/// Backend connection as reported by a gateway listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConnectionInfo {
    pub url: String,
    pub idx: BackendIndex,
}
