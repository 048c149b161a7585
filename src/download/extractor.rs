//! Media extractor abstraction.
//!
//! The pipeline never talks to yt-dlp directly: it goes through the
//! [`MediaExtractor`] trait, which exposes the two things it needs from the
//! extraction tool, a read-only probe and a fetch into a given output template.
//! `YtDlpExtractor` is the production implementation; tests plug in mocks.

use async_trait::async_trait;
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::download::error::{DownloadFailure, JobError};

/// Errors raised by an extractor backend.
#[derive(Debug, Error)]
pub enum ExtractorError {
    #[error("failed to start {bin}: {source}")]
    Spawn {
        bin: String,
        #[source]
        source: io::Error,
    },

    #[error("extractor exited with {status}: {stderr}")]
    Failed {
        status: String,
        stderr: String,
        reason: DownloadFailure,
    },

    #[error("unparseable extractor output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("no output file produced for {0}")]
    MissingOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl ExtractorError {
    /// Maps a probe failure into the job taxonomy.
    pub fn into_probe_error(self) -> JobError {
        JobError::Probe(self.to_string())
    }

    /// Maps a fetch failure into the job taxonomy.
    pub fn into_download_error(self) -> JobError {
        let reason = match &self {
            ExtractorError::Failed { reason, .. } => *reason,
            _ => DownloadFailure::Other,
        };
        JobError::download(reason, self.to_string())
    }
}

/// Options for a metadata probe.
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Do not resolve playlist entries beyond id/title/url
    pub flat_playlist: bool,
    /// Stop reading playlist entries after this many
    pub playlist_limit: usize,
}

/// Post-processing applied after the streams are fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcess {
    /// Transcode the audio stream (`--extract-audio`)
    ExtractAudio { codec: &'static str, bitrate_kbps: u32 },
    /// Merge separate video/audio streams into one container
    Merge { container: &'static str },
}

/// What to fetch: a yt-dlp format expression plus post-processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSpec {
    pub format: String,
    pub postprocess: PostProcess,
}

/// Raw probe output (subset of yt-dlp's `-J` JSON).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawMetadata {
    pub title: Option<String>,
    pub duration: Option<f64>,
    #[serde(default)]
    pub formats: Vec<RawFormat>,
    /// Present only for playlists; yt-dlp emits `null` for unavailable entries
    pub entries: Option<Vec<Option<RawEntry>>>,
}

/// One stream as reported by the extractor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawFormat {
    pub format_id: Option<String>,
    /// `"none"` for audio-only streams
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
    pub height: Option<i64>,
    pub filesize: Option<i64>,
    pub filesize_approx: Option<f64>,
    pub ext: Option<String>,
}

/// Lightweight playlist entry (flat extraction).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
    pub duration: Option<f64>,
}

/// Extraction backend used by the catalog builder and the download executor.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Human-readable name of this backend (e.g., "yt-dlp")
    fn name(&self) -> &str;

    /// Reads metadata without downloading any media.
    async fn probe(&self, url: &str, options: &ProbeOptions) -> Result<RawMetadata, ExtractorError>;

    /// Downloads `url` according to `spec`. `output_template` is a path whose
    /// file name ends in `.%(ext)s`; the extractor substitutes the real
    /// extension and returns the path it wrote.
    async fn fetch(&self, url: &str, spec: &FetchSpec, output_template: &Path) -> Result<PathBuf, ExtractorError>;
}
