//! Pipeworks Registry
//!
//! Multi-backend pipeline registry and reconciliation.
//!
//! Architecture:
//! - Registry: backend connections keyed by their reported index
//! - Catalog: concurrent listing of every backend, tolerant of individual failures
//! - Installer: install by URL or uploaded artifact at one backend
//! - Resolver: model catalog derived from the current pipeline set
//! - Valves: uncached fetch/replace of a pipeline's parameter bag, plus edit sessions
//! - Reconciler: pull-based consistency; every mutation invalidates the held view
//!
//! Every cross-backend join waits for all targets and reports failures per
//! target; one unreachable backend never hides the state of the others.

pub mod catalog;
pub mod error;
pub mod installer;
pub mod reconciler;
pub mod registry;
pub mod resolver;
pub mod valves;

#[cfg(test)]
mod testing;

pub use catalog::{CatalogListing, list_all};
pub use error::{PipelineError, Result, Target, TargetFailure};
pub use installer::{install_from_file, install_from_url};
pub use reconciler::{CatalogView, MutationReport, Reconciler, RefreshOutcome, RefreshPolicy};
pub use registry::BackendRegistry;
pub use resolver::{ModelCatalog, derive_models};
pub use valves::{ValveEditor, ValveState, get_valves, set_valves};
