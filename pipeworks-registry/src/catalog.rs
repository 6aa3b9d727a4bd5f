//! Pipeline catalog
//!
//! Lists installed pipelines on every registered backend concurrently and
//! merges the results. A backend whose listing fails for any reason (no
//! response, an error status, an undecodable body) contributes no records and
//! is reported in `unreachable`; its pipelines are not considered deleted.

use chrono::{DateTime, Utc};
use pipeworks_core::domain::backend::BackendIndex;
use pipeworks_core::domain::pipeline::{PipelineKey, PipelineRecord};
use pipeworks_core::dto::pipeline::{PipelineSummary, UpdatePipeline};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result, TargetFailure};
use crate::registry::BackendRegistry;

/// Merged result of listing every backend
#[derive(Debug, Clone, Default)]
pub struct CatalogListing {
    /// Records ordered by (backend index, id), one per composite key
    pub records: Vec<PipelineRecord>,
    /// Backends whose listing failed, whatever the cause
    ///
    /// The error tells a silent backend (`NetworkUnreachable`) apart from one
    /// that answered badly (`RemoteRejected`, `ParseError`, ...). Either way
    /// the state of that backend is unknown, not empty.
    pub unreachable: Vec<TargetFailure>,
}

impl CatalogListing {
    /// True when every backend answered
    pub fn is_complete(&self) -> bool {
        self.unreachable.is_empty()
    }

    pub fn get(&self, key: &PipelineKey) -> Option<&PipelineRecord> {
        self.records
            .iter()
            .find(|r| r.backend_index == key.backend_index && r.id == key.id)
    }

    pub fn contains(&self, key: &PipelineKey) -> bool {
        self.get(key).is_some()
    }

    /// Records of a single backend
    pub fn at(&self, index: BackendIndex) -> impl Iterator<Item = &PipelineRecord> {
        self.records.iter().filter(move |r| r.backend_index == index)
    }
}

/// List installed pipelines on every registered backend
///
/// Waits for every backend; individual failures never abort the others.
/// Dropping the returned future aborts the in-flight requests.
pub async fn list_all(registry: &BackendRegistry) -> CatalogListing {
    let observed_at = Utc::now();
    let mut pending: BTreeSet<BackendIndex> = registry.indices().collect();
    let mut tasks = JoinSet::new();

    for backend in registry.backends() {
        let backend = Arc::clone(backend);
        tasks.spawn(async move {
            let index = backend.connection().index;
            (index, backend.list_pipelines().await)
        });
    }

    let mut records = BTreeMap::new();
    let mut unreachable = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(summaries))) => {
                pending.remove(&index);
                debug!("Backend {} listed {} pipeline(s)", index, summaries.len());
                merge_listing(&mut records, index, summaries, observed_at);
            }
            Ok((index, Err(err))) => {
                pending.remove(&index);
                warn!("Failed to list pipelines on backend {}: {}", index, err);
                unreachable.push(TargetFailure::backend(index, err));
            }
            Err(e) => warn!("Listing task ended abnormally: {}", e),
        }
    }

    for index in pending {
        unreachable.push(TargetFailure::backend(
            index,
            PipelineError::Interrupted("listing did not complete".to_string()),
        ));
    }
    unreachable.sort_by(|a, b| a.target.cmp(&b.target));

    CatalogListing {
        records: records.into_values().collect(),
        unreachable,
    }
}

/// Adds one backend's listing to the merged set
///
/// Entries claiming a different backend index are dropped; the first entry
/// for a composite key wins.
fn merge_listing(
    records: &mut BTreeMap<PipelineKey, PipelineRecord>,
    index: BackendIndex,
    summaries: Vec<PipelineSummary>,
    observed_at: DateTime<Utc>,
) {
    for summary in summaries {
        match summary.idx {
            Some(reported) if reported != index => {
                warn!(
                    "Backend {} listed {} as belonging to backend {}; ignoring it",
                    index, summary.id, reported
                );
                continue;
            }
            _ => {}
        }

        let record = PipelineRecord::from_summary(summary, index, None, observed_at);
        records.entry(record.key()).or_insert(record);
    }
}

/// Get the current metadata of one pipeline from its own backend
pub async fn get_pipeline(registry: &BackendRegistry, key: &PipelineKey) -> Result<PipelineRecord> {
    let backend = registry.backend(key.backend_index)?;
    let summary = backend.get_pipeline(&key.id).await?;
    Ok(PipelineRecord::from_summary(
        summary,
        key.backend_index,
        None,
        Utc::now(),
    ))
}

/// Update the metadata of one pipeline at its own backend
pub async fn update_pipeline(
    registry: &BackendRegistry,
    key: &PipelineKey,
    update: &UpdatePipeline,
) -> Result<PipelineRecord> {
    let backend = registry.backend(key.backend_index)?;
    let summary = backend.update_pipeline(&key.id, update).await?;
    info!("Pipeline updated: {}", key);

    Ok(PipelineRecord::from_summary(
        summary,
        key.backend_index,
        None,
        Utc::now(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Target;
    use crate::testing::{FakeBackend, registry};
    use pipeworks_client::ClientError;

    #[tokio::test]
    async fn test_list_all_orders_by_backend_then_id() {
        let b0 = FakeBackend::new(0, "http://b0")
            .with_pipeline("zeta", &[])
            .with_pipeline("alpha", &[]);
        let b1 = FakeBackend::new(1, "http://b1").with_pipeline("alpha", &[]);
        let registry = registry(&[b1, b0]);

        let listing = list_all(&registry).await;

        let keys: Vec<_> = listing.records.iter().map(|r| r.key()).collect();
        assert_eq!(
            keys,
            vec![
                PipelineKey::new(0, "alpha"),
                PipelineKey::new(0, "zeta"),
                PipelineKey::new(1, "alpha"),
            ]
        );
        assert!(listing.is_complete());
        assert_eq!(listing.at(0).count(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_isolated() {
        let b0 = FakeBackend::new(0, "http://b0").with_pipeline("rag", &[]);
        let b1 = FakeBackend::new(1, "http://b1").with_pipeline("summarizer", &[]);
        let b2 = FakeBackend::new(2, "http://b2").with_pipeline("translator", &[]);
        b1.set_unreachable(true);
        let registry = registry(&[b0, b1, b2]);

        let listing = list_all(&registry).await;

        assert!(listing.contains(&PipelineKey::new(0, "rag")));
        assert!(listing.contains(&PipelineKey::new(2, "translator")));
        assert!(!listing.contains(&PipelineKey::new(1, "summarizer")));
        assert_eq!(listing.unreachable.len(), 1);
        assert_eq!(listing.unreachable[0].target, Target::Backend(1));
        assert!(listing.unreachable[0].error.is_unreachable());
    }

    #[tokio::test]
    async fn test_all_backends_unreachable_yields_empty_listing_with_failures() {
        let b0 = FakeBackend::new(0, "http://b0").with_pipeline("rag", &[]);
        let b1 = FakeBackend::new(1, "http://b1");
        b0.set_unreachable(true);
        b1.set_unreachable(true);
        let registry = registry(&[b0, b1]);

        let listing = list_all(&registry).await;

        assert!(listing.records.is_empty());
        let targets: Vec<_> = listing.unreachable.iter().map(|f| f.target.clone()).collect();
        assert_eq!(targets, vec![Target::Backend(0), Target::Backend(1)]);
    }

    #[tokio::test]
    async fn test_entries_reported_for_other_backends_are_dropped() {
        let b0 = FakeBackend::new(0, "http://b0")
            .with_pipeline("rag", &[])
            .with_foreign_entry("stray", 1)
            .with_foreign_entry("rag", 0);
        let registry = registry(&[b0]);

        let listing = list_all(&registry).await;

        assert_eq!(listing.records.len(), 1);
        assert_eq!(listing.records[0].key(), PipelineKey::new(0, "rag"));
    }

    #[tokio::test]
    async fn test_undecodable_listing_is_reported_with_its_cause() {
        let b0 = FakeBackend::new(0, "http://b0").with_pipeline("rag", &[]);
        let b1 = FakeBackend::new(1, "http://b1").with_pipeline("summarizer", &[]);
        b1.fail_listing_with(ClientError::ParseError("expected `data`".to_string()));
        let registry = registry(&[b0, b1]);

        let listing = list_all(&registry).await;

        assert!(listing.contains(&PipelineKey::new(0, "rag")));
        assert_eq!(listing.unreachable.len(), 1);
        let failure = &listing.unreachable[0];
        assert_eq!(failure.target, Target::Backend(1));
        assert!(!failure.error.is_unreachable());
        assert!(matches!(
            failure.error,
            PipelineError::Client(ClientError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_registry_lists_nothing() {
        let listing = list_all(&BackendRegistry::new()).await;
        assert!(listing.records.is_empty());
        assert!(listing.is_complete());
    }

    #[tokio::test]
    async fn test_update_pipeline_targets_only_its_backend() {
        let b0 = FakeBackend::new(0, "http://b0").with_pipeline("rag", &[]);
        let b1 = FakeBackend::new(1, "http://b1").with_pipeline("rag", &[]);
        let registry = registry(&[b0.clone(), b1.clone()]);

        let update = UpdatePipeline {
            name: Some("Retrieval".to_string()),
            ..Default::default()
        };
        let record = update_pipeline(&registry, &PipelineKey::new(1, "rag"), &update)
            .await
            .unwrap();

        assert_eq!(record.display_name, "Retrieval");
        assert_eq!(record.backend_index, 1);
        assert_eq!(b1.calls(), vec!["update:rag".to_string()]);
        assert!(b0.calls().is_empty());

        let fetched = get_pipeline(&registry, &PipelineKey::new(0, "rag")).await.unwrap();
        assert_eq!(fetched.display_name, "rag pipeline");
    }

    #[tokio::test]
    async fn test_unknown_backend() {
        let registry = registry(&[]);
        let err = get_pipeline(&registry, &PipelineKey::new(3, "rag"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownBackend(3)));
    }
}
