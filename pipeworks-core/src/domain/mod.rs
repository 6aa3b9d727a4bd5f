//! Core domain types
//!
//! These types describe what the client believes is installed on each backend.
//! They are rebuilt from backend responses on every refresh and never persisted.
//! Every pipeline-scoped type carries the backend index it belongs to, so the
//! same pipeline id on two backends never collapses into one entity.

pub mod backend;
pub mod model;
pub mod pipeline;
pub mod valve;
