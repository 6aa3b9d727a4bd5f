//! Pipeline installer
//!
//! Installs a pipeline at exactly one backend. A record is produced only
//! from a successful install response; on failure nothing is retained and
//! the pipeline is back in `Uninstalled`. Installing never updates results
//! the caller already holds: the caller must list again to observe it.

use chrono::Utc;
use pipeworks_client::{ClientError, PipelineArtifact};
use pipeworks_core::domain::backend::BackendIndex;
use pipeworks_core::domain::pipeline::{PipelineEvent, PipelineRecord, PipelineState, SourceType};
use pipeworks_core::dto::pipeline::PipelineSummary;
use std::future::Future;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::registry::BackendRegistry;

/// Install a pipeline the backend fetches from `source_url`
///
/// # Errors
/// - `InvalidRequest` if the URL is not http(s); nothing is sent
/// - `NetworkUnreachable` if the backend did not respond
/// - `DuplicateId` if the id already exists on that backend
/// - `RemoteRejected` if the backend refused the pipeline
pub async fn install_from_url(
    registry: &BackendRegistry,
    source_url: &str,
    backend_index: BackendIndex,
) -> Result<PipelineRecord> {
    let backend = registry.backend(backend_index)?;
    info!("Installing pipeline from {} on backend {}", source_url, backend_index);

    run_install(
        backend_index,
        SourceType::UrlFetch,
        backend.install_from_url(source_url),
    )
    .await
}

/// Install a pipeline from an uploaded artifact
///
/// Empty artifacts are rejected as `InvalidArtifact` before any request.
pub async fn install_from_file(
    registry: &BackendRegistry,
    bytes: Vec<u8>,
    filename: &str,
    backend_index: BackendIndex,
) -> Result<PipelineRecord> {
    let backend = registry.backend(backend_index)?;
    let artifact = PipelineArtifact::new(filename, bytes)?;
    info!(
        "Uploading pipeline {} ({} bytes) to backend {}",
        filename,
        artifact.len(),
        backend_index
    );

    run_install(
        backend_index,
        SourceType::FileUpload,
        backend.install_from_file(artifact),
    )
    .await
}

/// Drives one install through the pipeline lifecycle
async fn run_install<F>(
    backend_index: BackendIndex,
    source_type: SourceType,
    request: F,
) -> Result<PipelineRecord>
where
    F: Future<Output = pipeworks_client::Result<PipelineSummary>>,
{
    let state = PipelineState::Uninstalled.apply(PipelineEvent::Install)?;
    debug!("Install on backend {} is {:?}", backend_index, state);

    let outcome = request.await.and_then(|summary| {
        if summary.id.trim().is_empty() {
            return Err(ClientError::ParseError(
                "Install response carried no pipeline id".to_string(),
            ));
        }
        Ok(summary)
    });

    match outcome {
        Ok(summary) => {
            let state = state.apply(PipelineEvent::InstallSucceeded)?;
            if let Some(reported) = summary.idx.filter(|reported| *reported != backend_index) {
                warn!(
                    "Backend {} reported index {} for installed pipeline {}",
                    backend_index, reported, summary.id
                );
            }

            let record = PipelineRecord::from_summary(
                summary,
                backend_index,
                Some(source_type),
                Utc::now(),
            );
            info!("Pipeline installed: {} ({:?})", record.key(), state);
            Ok(record)
        }
        Err(err) => {
            let state = state.apply(PipelineEvent::InstallFailed)?;
            warn!(
                "Install on backend {} failed, pipeline is {:?}: {}",
                backend_index, state, err
            );
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::list_all;
    use crate::error::PipelineError;
    use crate::testing::{FakeBackend, registry};
    use pipeworks_core::domain::pipeline::PipelineKey;

    #[tokio::test]
    async fn test_install_from_url_then_list_includes_it_once() {
        let b0 = FakeBackend::new(0, "http://b0");
        let b1 = FakeBackend::new(1, "http://b1");
        let registry = registry(&[b0.clone(), b1.clone()]);

        let record = install_from_url(&registry, "https://hub.example/summarizer.py", 1)
            .await
            .unwrap();

        assert_eq!(record.key(), PipelineKey::new(1, "summarizer"));
        assert_eq!(record.source_type, Some(SourceType::UrlFetch));
        assert!(b0.calls().is_empty());

        let listing = list_all(&registry).await;
        let matches = listing
            .records
            .iter()
            .filter(|r| r.key() == PipelineKey::new(1, "summarizer"))
            .count();
        assert_eq!(matches, 1);
        assert_eq!(listing.records.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_is_scoped_per_backend() {
        let b0 = FakeBackend::new(0, "http://b0");
        let b1 = FakeBackend::new(1, "http://b1").with_pipeline("summarizer", &[]);
        let registry = registry(&[b0.clone(), b1]);

        let err = install_from_url(&registry, "https://hub.example/summarizer.py", 1)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Client(ClientError::DuplicateId(_))
        ));

        // Same id at another backend is an independent install
        let record = install_from_url(&registry, "https://hub.example/summarizer.py", 0)
            .await
            .unwrap();
        assert_eq!(record.backend_index, 0);
        assert!(b0.has_pipeline("summarizer"));
    }

    #[tokio::test]
    async fn test_failed_install_leaves_nothing_behind() {
        let b0 = FakeBackend::new(0, "http://b0");
        let registry = registry(&[b0.clone()]);

        let err = install_from_url(&registry, "https://hub.example/invalid.py", 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Client(ClientError::RemoteRejected { status: 400, .. })
        ));

        let listing = list_all(&registry).await;
        assert!(listing.records.is_empty());
    }

    #[tokio::test]
    async fn test_install_on_unreachable_backend() {
        let b0 = FakeBackend::new(0, "http://b0");
        b0.set_unreachable(true);
        let registry = registry(&[b0]);

        let err = install_from_url(&registry, "https://hub.example/rag.py", 0)
            .await
            .unwrap_err();
        assert!(err.is_unreachable());
    }

    #[tokio::test]
    async fn test_install_on_unknown_backend() {
        let registry = registry(&[]);
        let err = install_from_url(&registry, "https://hub.example/rag.py", 4)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownBackend(4)));
    }

    #[tokio::test]
    async fn test_install_from_file() {
        let b0 = FakeBackend::new(0, "http://b0");
        let registry = registry(&[b0]);

        let record = install_from_file(
            &registry,
            b"class Pipeline:\n    pass\n".to_vec(),
            "translator.py",
            0,
        )
        .await
        .unwrap();

        assert_eq!(record.key(), PipelineKey::new(0, "translator"));
        assert_eq!(record.source_type, Some(SourceType::FileUpload));
    }

    #[tokio::test]
    async fn test_invalid_artifact_is_reported_verbatim() {
        let b0 = FakeBackend::new(0, "http://b0");
        let registry = registry(&[b0.clone()]);

        let err = install_from_file(&registry, b"import os".to_vec(), "broken.py", 0)
            .await
            .unwrap_err();
        match err {
            PipelineError::Client(ClientError::InvalidArtifact(detail)) => {
                assert!(detail.is_structured());
                assert!(detail.to_string().contains("no Pipeline class"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(!b0.has_pipeline("broken"));
    }

    #[tokio::test]
    async fn test_empty_artifact_never_reaches_backend() {
        let b0 = FakeBackend::new(0, "http://b0");
        let registry = registry(&[b0.clone()]);

        let err = install_from_file(&registry, Vec::new(), "empty.py", 0)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Client(ClientError::InvalidArtifact(_))
        ));
        assert!(b0.calls().is_empty());
    }
}
