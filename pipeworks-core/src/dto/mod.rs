//! Data Transfer Objects for backend communication
//!
//! Wire shapes of the pipeline REST surface exposed by each backend
//! connection. Domain types are built from these after the client has
//! attached the backend index the response came from.

use serde::{Deserialize, Serialize};

pub mod backend;
pub mod model;
pub mod pipeline;

/// `{ "data": [...] }` envelope used by listing endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataEnvelope<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

impl<T> DataEnvelope<T> {
    pub fn into_inner(self) -> Vec<T> {
        self.data
    }
}
