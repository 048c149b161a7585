//! Scripted [`MediaExtractor`] for tests
//!
//! Probes return canned metadata; fetches write a (sparse) file of a given
//! size under the output template, or fail, hang or wait for a gate.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use dorafetch::download::extractor::{ExtractorError, FetchSpec, ProbeOptions, RawMetadata};
use dorafetch::download::{DownloadFailure, MediaExtractor};

#[derive(Clone)]
pub enum ProbeBehavior {
    Metadata(RawMetadata),
    Fail,
    Hang,
}

#[derive(Clone)]
pub enum FetchBehavior {
    /// Write a file of `size` bytes with extension `ext`
    Write { ext: &'static str, size: u64 },
    /// Write a partial file, then fail with `reason`
    Fail(DownloadFailure),
    /// Write a partial file, then never finish
    Hang,
    /// Wait for the gate, then write a file of `size` bytes
    Gated { gate: Arc<Notify>, size: u64 },
}

pub struct MockExtractor {
    probe: ProbeBehavior,
    fetch: FetchBehavior,
    probe_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    written: Mutex<Vec<PathBuf>>,
}

impl MockExtractor {
    pub fn new(probe: ProbeBehavior, fetch: FetchBehavior) -> Self {
        Self {
            probe,
            fetch,
            probe_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            written: Mutex::new(Vec::new()),
        }
    }

    /// Extractor that only downloads, writing `size` bytes.
    pub fn writing(size: u64) -> Self {
        Self::new(
            ProbeBehavior::Fail,
            FetchBehavior::Write { ext: "mp4", size },
        )
    }

    pub fn probing(metadata: RawMetadata) -> Self {
        Self::new(
            ProbeBehavior::Metadata(metadata),
            FetchBehavior::Fail(DownloadFailure::Other),
        )
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Every file this extractor created.
    pub fn written(&self) -> Vec<PathBuf> {
        self.written.lock().unwrap().clone()
    }

    fn write(&self, template: &Path, ext: &str, size: u64) -> std::io::Result<PathBuf> {
        let path = PathBuf::from(template.to_string_lossy().replace("%(ext)s", ext));
        let file = std::fs::File::create(&path)?;
        file.set_len(size)?;
        self.written.lock().unwrap().push(path.clone());
        Ok(path)
    }
}

#[async_trait]
impl MediaExtractor for MockExtractor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, _url: &str, _options: &ProbeOptions) -> Result<RawMetadata, ExtractorError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        match &self.probe {
            ProbeBehavior::Metadata(metadata) => Ok(metadata.clone()),
            ProbeBehavior::Fail => Err(ExtractorError::Failed {
                status: "exit status: 1".into(),
                stderr: "ERROR: Unsupported URL".into(),
                reason: DownloadFailure::Unsupported,
            }),
            ProbeBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(RawMetadata::default())
            }
        }
    }

    async fn fetch(&self, _url: &str, _spec: &FetchSpec, template: &Path) -> Result<PathBuf, ExtractorError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        match &self.fetch {
            FetchBehavior::Write { ext, size } => Ok(self.write(template, ext, *size)?),
            FetchBehavior::Fail(reason) => {
                self.write(template, "mp4.part", 1024)?;
                Err(ExtractorError::Failed {
                    status: "exit status: 1".into(),
                    stderr: "ERROR: [youtube] abc: Video unavailable /tmp/secret/path".into(),
                    reason: *reason,
                })
            }
            FetchBehavior::Hang => {
                self.write(template, "f137.mp4.part", 4096)?;
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ExtractorError::MissingOutput("hung".into()))
            }
            FetchBehavior::Gated { gate, size } => {
                gate.notified().await;
                Ok(self.write(template, "mp4", *size)?)
            }
        }
    }
}
