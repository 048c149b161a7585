//! Download executor: materializes a file for a source under a selector.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;

use crate::download::catalog::MediaSource;
use crate::download::cleanup::TempArtifact;
use crate::download::error::{DownloadFailure, JobError};
use crate::download::extractor::MediaExtractor;
use crate::download::selector::FormatSelector;

pub struct DownloadExecutor {
    extractor: Arc<dyn MediaExtractor>,
    max_file_size: u64,
}

impl DownloadExecutor {
    pub fn new(extractor: Arc<dyn MediaExtractor>, max_file_size: u64) -> Self {
        Self {
            extractor,
            max_file_size,
        }
    }

    /// Downloads `source` into `artifact`'s output template.
    ///
    /// The fetch runs on its own task so the caller stays responsive. If the
    /// deadline passes or `cancel` fires, that task is aborted and awaited
    /// before the artifact is cleaned, so nothing the extractor leaves behind
    /// can appear after cleanup. Dropping the returned future only requests the
    /// abort. On any failure the artifact is cleaned and no path is returned.
    pub async fn download(
        &self,
        source: &MediaSource,
        selector: &FormatSelector,
        artifact: &mut TempArtifact,
        deadline: Duration,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, JobError> {
        let extractor = Arc::clone(&self.extractor);
        let url = source.as_str().to_string();
        let spec = selector.fetch_spec(self.max_file_size);
        let template = artifact.output_template();

        log::info!(
            "Downloading {} as {} via {} into {}",
            source,
            selector,
            self.extractor.name(),
            template.display()
        );

        let mut handle = AbortOnDropHandle::new(tokio::spawn(async move {
            extractor.fetch(&url, &spec, &template).await
        }));

        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            joined = tokio::time::timeout(deadline, &mut handle) => Some(joined),
        };

        let result = match joined {
            None => {
                reap(handle).await;
                Err(JobError::Cancelled)
            }
            Some(Err(_)) => {
                reap(handle).await;
                Err(JobError::Timeout {
                    stage: "download",
                    after: deadline,
                })
            }
            Some(Ok(Err(join_error))) => Err(JobError::download(
                DownloadFailure::Other,
                format!("download task failed: {}", join_error),
            )),
            Some(Ok(Ok(Err(extractor_error)))) => Err(extractor_error.into_download_error()),
            Some(Ok(Ok(Ok(path)))) if !path.exists() => Err(JobError::download(
                DownloadFailure::Other,
                format!("extractor reported {} but it does not exist", path.display()),
            )),
            Some(Ok(Ok(Ok(path)))) => Ok(path),
        };

        match result {
            Ok(path) => {
                artifact.set_path(path.clone());
                Ok(path)
            }
            Err(e) => {
                log::error!("Download of {} failed: {}", source, e);
                artifact.cleanup();
                Err(e)
            }
        }
    }
}

/// Aborts the fetch task and waits until it is gone, so its extractor (and
/// any process it started) is dead before the caller cleans up.
async fn reap<T>(mut handle: AbortOnDropHandle<T>) {
    handle.abort();
    if let Err(e) = (&mut handle).await {
        if !e.is_cancelled() {
            log::warn!("Download task ended abnormally while being stopped: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::extractor::{ExtractorError, FetchSpec, ProbeOptions, RawMetadata};
    use async_trait::async_trait;
    use std::path::Path;
    use uuid::Uuid;

    /// Writes a file when dropped, like a postprocessor finishing its output
    /// as the fetch is torn down.
    struct WriteOnDrop(PathBuf);

    impl Drop for WriteOnDrop {
        fn drop(&mut self) {
            let _ = std::fs::write(&self.0, b"late");
        }
    }

    /// Writes a partial file, then behaves according to `mode`.
    struct PartialThenFail {
        mode: &'static str,
    }

    #[async_trait]
    impl MediaExtractor for PartialThenFail {
        fn name(&self) -> &str {
            "test"
        }

        async fn probe(&self, _url: &str, _options: &ProbeOptions) -> Result<RawMetadata, ExtractorError> {
            Ok(RawMetadata::default())
        }

        async fn fetch(&self, _url: &str, _spec: &FetchSpec, template: &Path) -> Result<PathBuf, ExtractorError> {
            let partial = PathBuf::from(template.to_string_lossy().replace("%(ext)s", "mp4.part"));
            std::fs::write(&partial, b"half")?;
            match self.mode {
                "hang" => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(partial)
                }
                "late" => {
                    let _late = WriteOnDrop(PathBuf::from(
                        template.to_string_lossy().replace("%(ext)s", "temp.mp4"),
                    ));
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(partial)
                }
                "ghost" => Ok(template.with_file_name("ghost.mp4")),
                _ => Err(ExtractorError::Failed {
                    status: "exit status: 1".into(),
                    stderr: "ERROR: Video unavailable".into(),
                    reason: DownloadFailure::Unavailable,
                }),
            }
        }
    }

    fn setup(mode: &'static str) -> (tempfile::TempDir, DownloadExecutor, TempArtifact, MediaSource) {
        let dir = tempfile::tempdir().unwrap();
        let executor = DownloadExecutor::new(Arc::new(PartialThenFail { mode }), 1024);
        let artifact = TempArtifact::for_job(dir.path(), Uuid::new_v4());
        let source = MediaSource::parse("https://example.com/v").unwrap();
        (dir, executor, artifact, source)
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn test_failure_leaves_no_partial_files() {
        let (dir, executor, mut artifact, source) = setup("fail");
        let err = executor
            .download(&source, &FormatSelector::Audio, &mut artifact, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            JobError::Download {
                reason: DownloadFailure::Unavailable,
                ..
            }
        ));
        assert!(artifact.path().is_none());
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_timeout_leaves_no_partial_files() {
        let (dir, executor, mut artifact, source) = setup("hang");
        let err = executor
            .download(
                &source,
                &FormatSelector::Video { max_quality: 720 },
                &mut artifact,
                Duration::from_millis(50),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Timeout { stage: "download", .. }));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_reported_path_must_exist() {
        let (dir, executor, mut artifact, source) = setup("ghost");
        let err = executor
            .download(&source, &FormatSelector::Audio, &mut artifact, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Download { .. }));
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_timeout_waits_for_fetch_teardown_before_cleanup() {
        let (dir, executor, mut artifact, source) = setup("late");
        let err = executor
            .download(
                &source,
                &FormatSelector::Video { max_quality: 720 },
                &mut artifact,
                Duration::from_millis(50),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Timeout { stage: "download", .. }));
        tokio::task::yield_now().await;
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn test_cancel_stops_fetch_and_cleans_up() {
        let (dir, executor, mut artifact, source) = setup("late");
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = executor
            .download(&source, &FormatSelector::Audio, &mut artifact, Duration::from_secs(60), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Cancelled));
        tokio::task::yield_now().await;
        assert!(dir_is_empty(dir.path()));
    }
}
