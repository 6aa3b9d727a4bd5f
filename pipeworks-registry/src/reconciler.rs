//! Reconciliation layer
//!
//! Pull-based consistency. The reconciler holds at most one committed
//! [`CatalogView`]; every mutation marks it stale and, under the immediate
//! policy, rebuilds it. A view is only ever replaced whole, after both the
//! listing and the model derivation finished, so dropping a refresh midway
//! leaves the previous view in place and aborts its in-flight requests.
//!
//! A backend that fails to list does not lose its pipelines: the records and
//! models last seen there are carried into the new view and flagged as
//! unverified until the backend answers again. A mutation marks the view
//! stale before its request goes out, so a mutation dropped midway still
//! leaves the view stale.

use chrono::{DateTime, Utc};
use pipeworks_core::domain::backend::BackendIndex;
use pipeworks_core::domain::model::ModelEntry;
use pipeworks_core::domain::pipeline::{PipelineEvent, PipelineKey, PipelineRecord, PipelineState};
use pipeworks_core::domain::valve::{ValveConfig, ValveParameters};
use pipeworks_core::dto::pipeline::UpdatePipeline;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{self, list_all};
use crate::error::{PipelineError, Result, TargetFailure};
use crate::installer;
use crate::registry::BackendRegistry;
use crate::resolver::derive_models;
use crate::valves::{self, ValveEditor, ValveState};

/// Delete one pipeline at its own backend
///
/// Only the pipeline under `key` is affected; a pipeline with the same id
/// at another backend is untouched.
pub async fn delete_pipeline(registry: &BackendRegistry, key: &PipelineKey) -> Result<()> {
    let backend = registry.backend(key.backend_index)?;
    backend.delete_pipeline(&key.id).await?;
    info!("Pipeline deleted: {}", key);
    Ok(())
}

/// A committed snapshot of every backend's pipelines and their models
#[derive(Debug, Clone)]
pub struct CatalogView {
    pub records: Vec<PipelineRecord>,
    pub models: Vec<ModelEntry>,
    /// Backends whose listing failed
    pub unreachable: Vec<TargetFailure>,
    /// Pipelines whose model query failed
    pub model_failures: Vec<TargetFailure>,
    /// Last known, carried from a backend that failed to list
    pub unverified: BTreeSet<PipelineKey>,
    pub refreshed_at: DateTime<Utc>,
}

impl CatalogView {
    pub fn get(&self, key: &PipelineKey) -> Option<&PipelineRecord> {
        self.records
            .iter()
            .find(|r| r.backend_index == key.backend_index && r.id == key.id)
    }

    pub fn contains(&self, key: &PipelineKey) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = PipelineKey> + '_ {
        self.records.iter().map(PipelineRecord::key)
    }

    pub fn models_of(&self, key: &PipelineKey) -> impl Iterator<Item = &ModelEntry> {
        self.models
            .iter()
            .filter(move |m| m.backend_index == key.backend_index && m.pipeline_id == key.id)
    }

    /// True when the record was carried over rather than observed
    pub fn is_unverified(&self, key: &PipelineKey) -> bool {
        self.unverified.contains(key)
    }

    pub fn records_at(&self, index: BackendIndex) -> impl Iterator<Item = &PipelineRecord> {
        self.records.iter().filter(move |r| r.backend_index == index)
    }

    /// Every isolated failure, listings first
    pub fn failures(&self) -> impl Iterator<Item = &TargetFailure> {
        self.unreachable.iter().chain(self.model_failures.iter())
    }

    pub fn is_complete(&self) -> bool {
        self.unreachable.is_empty() && self.model_failures.is_empty()
    }
}

/// When a mutation rebuilds the view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Refresh right after every mutation
    #[default]
    Immediate,
    /// Only mark the view stale; the caller refreshes
    Deferred,
}

/// Result of rebuilding the view
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// No refresh was attempted
    Skipped,
    /// Every backend and pipeline answered
    Complete,
    /// The view was committed without the listed targets
    Partial(Vec<TargetFailure>),
}

impl RefreshOutcome {
    fn of(view: &CatalogView) -> Self {
        if view.is_complete() {
            RefreshOutcome::Complete
        } else {
            RefreshOutcome::Partial(view.failures().cloned().collect())
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, RefreshOutcome::Complete)
    }

    pub fn failures(&self) -> &[TargetFailure] {
        match self {
            RefreshOutcome::Partial(failures) => failures.as_slice(),
            _ => &[],
        }
    }
}

/// A mutation's own outcome next to the outcome of the refresh that followed
///
/// The two are independent: valves may be saved while the refresh after it
/// only partially succeeds, or a failed install may still be followed by a
/// complete refresh.
#[derive(Debug, Clone)]
pub struct MutationReport<T> {
    pub outcome: Result<T>,
    pub refresh: RefreshOutcome,
}

impl<T> MutationReport<T> {
    fn unrefreshed(outcome: Result<T>) -> Self {
        Self {
            outcome,
            refresh: RefreshOutcome::Skipped,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn into_result(self) -> Result<T> {
        self.outcome
    }
}

/// Owns the committed view and applies mutations against the registry
pub struct Reconciler {
    registry: Arc<BackendRegistry>,
    view: Option<CatalogView>,
    stale: bool,
    policy: RefreshPolicy,
    /// Bumped whenever a pipeline is reinstalled or deleted
    epochs: HashMap<PipelineKey, u64>,
    /// Deleted here and not observed since
    deleted: HashSet<PipelineKey>,
}

impl Reconciler {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self::with_policy(registry, RefreshPolicy::default())
    }

    pub fn with_policy(registry: Arc<BackendRegistry>, policy: RefreshPolicy) -> Self {
        Self {
            registry,
            view: None,
            stale: true,
            policy,
            epochs: HashMap::new(),
            deleted: HashSet::new(),
        }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn policy(&self) -> RefreshPolicy {
        self.policy
    }

    /// Last committed view, possibly stale
    pub fn view(&self) -> Option<&CatalogView> {
        self.view.as_ref()
    }

    /// True until the first refresh and after every mutation
    pub fn is_stale(&self) -> bool {
        self.stale || self.view.is_none()
    }

    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Rebuild the view from every backend and commit it
    pub async fn refresh(&mut self) -> RefreshOutcome {
        let registry = Arc::clone(&self.registry);
        let listing = list_all(&registry).await;
        let catalog = derive_models(&registry, &listing.records).await;

        let mut view = CatalogView {
            records: listing.records,
            models: catalog.models,
            unreachable: listing.unreachable,
            model_failures: catalog.failures,
            unverified: BTreeSet::new(),
            refreshed_at: Utc::now(),
        };

        for record in &view.records {
            self.deleted.remove(&record.key());
        }
        self.carry_forward(&mut view);
        self.stale = false;
        let view = self.view.insert(view);

        let outcome = RefreshOutcome::of(view);
        match &outcome {
            RefreshOutcome::Partial(failures) => warn!(
                "Refreshed {} pipeline(s), {} target(s) failed",
                view.records.len(),
                failures.len()
            ),
            _ => info!(
                "Refreshed {} pipeline(s), {} model(s)",
                view.records.len(),
                view.models.len()
            ),
        }
        outcome
    }

    /// Copies the last known records and models of every backend that failed
    /// to list into `view`
    ///
    /// Pipelines deleted here since are not carried.
    fn carry_forward(&self, view: &mut CatalogView) {
        let Some(previous) = &self.view else {
            return;
        };
        let silent: HashSet<BackendIndex> = view
            .unreachable
            .iter()
            .map(|f| f.target.backend_index())
            .collect();
        if silent.is_empty() {
            return;
        }

        let carried: Vec<PipelineRecord> = previous
            .records
            .iter()
            .filter(|r| silent.contains(&r.backend_index))
            .filter(|r| {
                let key = r.key();
                !self.deleted.contains(&key) && !view.contains(&key)
            })
            .cloned()
            .collect();

        for record in carried {
            let key = record.key();
            view.models.extend(previous.models_of(&key).cloned());
            view.records.push(record);
            debug!("Carrying {} from the last refresh", key);
            view.unverified.insert(key);
        }

        view.records.sort_by_key(|r| r.backend_index);
        view.models.sort_by_key(|m| m.backend_index);
    }

    /// Install from a URL at one backend
    pub async fn install_from_url(
        &mut self,
        source_url: &str,
        backend_index: BackendIndex,
    ) -> MutationReport<PipelineRecord> {
        self.stale = true;
        let outcome = installer::install_from_url(&self.registry, source_url, backend_index).await;
        if let Ok(record) = &outcome {
            self.installed(record.key());
        }
        self.finish(outcome).await
    }

    /// Install from an uploaded artifact at one backend
    pub async fn install_from_file(
        &mut self,
        bytes: Vec<u8>,
        filename: &str,
        backend_index: BackendIndex,
    ) -> MutationReport<PipelineRecord> {
        self.stale = true;
        let outcome =
            installer::install_from_file(&self.registry, bytes, filename, backend_index).await;
        if let Ok(record) = &outcome {
            self.installed(record.key());
        }
        self.finish(outcome).await
    }

    /// Delete one pipeline
    ///
    /// Deleting a pipeline this reconciler already deleted is rejected
    /// without contacting the backend, unless a refresh has since observed
    /// it again.
    pub async fn delete(&mut self, key: &PipelineKey) -> MutationReport<()> {
        let from = if self.deleted.contains(key) {
            PipelineState::Deleted
        } else {
            PipelineState::Installed
        };
        if let Err(err) = from.apply(PipelineEvent::Delete) {
            return MutationReport::unrefreshed(Err(err.into()));
        }

        self.stale = true;
        let outcome = delete_pipeline(&self.registry, key).await;
        match &outcome {
            Ok(()) => {
                self.deleted.insert(key.clone());
                self.bump(key);
            }
            // Already gone; valves fetched earlier are stale either way
            Err(err) if err.is_not_found() => self.bump(key),
            Err(_) => {}
        }
        self.finish(outcome).await
    }

    /// Update a pipeline's metadata
    pub async fn update(
        &mut self,
        key: &PipelineKey,
        update: &UpdatePipeline,
    ) -> MutationReport<PipelineRecord> {
        self.stale = true;
        let outcome = catalog::update_pipeline(&self.registry, key, update).await;
        self.finish(outcome).await
    }

    /// Replace a pipeline's valves without a prior fetch
    pub async fn set_valves(
        &mut self,
        key: &PipelineKey,
        parameters: ValveParameters,
    ) -> MutationReport<ValveConfig> {
        self.stale = true;
        let outcome = valves::set_valves(&self.registry, key, parameters).await;
        self.finish(outcome).await
    }

    /// Open a valve editing session bound to the pipeline's current epoch
    pub fn open_valves(&self, key: PipelineKey) -> ValveEditor {
        let epoch = self.epoch(&key);
        ValveEditor::with_epoch(key, epoch)
    }

    /// True when the pipeline was neither reinstalled nor deleted since the
    /// session was opened
    pub fn is_current(&self, editor: &ValveEditor) -> bool {
        editor.epoch() == self.epoch(editor.key())
    }

    /// Save an editing session
    ///
    /// # Errors
    /// - `StaleValves` if the pipeline was reinstalled or deleted since the
    ///   session was opened; the editor moves to `Error` and nothing is sent
    pub async fn save_valves(&mut self, editor: &mut ValveEditor) -> MutationReport<ValveConfig> {
        if !self.is_current(editor) {
            let err = editor.fail(PipelineError::StaleValves(editor.key().clone()));
            return MutationReport::unrefreshed(Err(err));
        }

        let sends = editor.state() != ValveState::Fetched;
        if sends {
            self.stale = true;
        }
        let outcome = editor.save(&self.registry).await;
        if !sends {
            return MutationReport::unrefreshed(outcome);
        }
        self.finish(outcome).await
    }

    fn epoch(&self, key: &PipelineKey) -> u64 {
        self.epochs.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: &PipelineKey) {
        let epoch = self.epochs.entry(key.clone()).or_default();
        *epoch += 1;
        debug!("Valve epoch of {} is now {}", key, epoch);
    }

    fn installed(&mut self, key: PipelineKey) {
        self.deleted.remove(&key);
        self.bump(&key);
    }

    /// Applies the refresh policy after a mutation reached its backend
    async fn finish<T>(&mut self, outcome: Result<T>) -> MutationReport<T> {
        let refresh = match self.policy {
            RefreshPolicy::Immediate => self.refresh().await,
            RefreshPolicy::Deferred => RefreshOutcome::Skipped,
        };
        MutationReport { outcome, refresh }
    }
}
