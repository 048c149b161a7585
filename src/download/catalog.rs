//! Format catalog builder.
//!
//! Turns raw extractor metadata into what the user chooses from: a playlist
//! summary, or the list of video formats that fit under the upload ceiling,
//! best quality first. Audio is not part of the list, it is always offered as
//! a separate "extract audio" option.

use std::time::Duration;
use url::Url;

use crate::core::config::PLAYLIST_ENTRY_LIMIT;
use crate::download::error::JobError;
use crate::download::extractor::{MediaExtractor, ProbeOptions, RawFormat, RawMetadata};
use crate::download::size_guard;

const UNTITLED: &str = "Untitled";
const UNTITLED_PLAYLIST: &str = "Playlist";

/// A media URL submitted by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaSource(Url);

impl MediaSource {
    /// Accepts absolute http(s) URLs only.
    pub fn parse(raw: &str) -> Result<Self, JobError> {
        let url = Url::parse(raw.trim()).map_err(|e| JobError::Probe(format!("invalid URL: {}", e)))?;
        match url.scheme() {
            "http" | "https" if url.host_str().is_some() => Ok(Self(url)),
            scheme => Err(JobError::Probe(format!("unsupported URL scheme: {}", scheme))),
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.0
    }
}

impl std::fmt::Display for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// One selectable video encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatOption {
    pub format_id: String,
    /// Vertical resolution, 0 when unknown
    pub quality: u32,
    /// Declared size, 0 when unknown
    pub estimated_size_bytes: u64,
    pub extension: String,
}

/// Lightweight summary of a playlist entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaylistEntry {
    pub title: String,
    pub url: String,
    pub duration_seconds: u64,
}

/// Probe result: immutable snapshot of the source at probe time.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaInfo {
    Playlist {
        title: String,
        entries: Vec<PlaylistEntry>,
    },
    SingleVideo {
        title: String,
        duration_seconds: u64,
        formats: Vec<FormatOption>,
    },
}

/// Probes `source` and builds its catalog.
///
/// Runs the extractor under `deadline`; a slow source yields
/// [`JobError::Timeout`], an unresolvable one [`JobError::Probe`].
pub async fn probe(
    extractor: &dyn MediaExtractor,
    source: &MediaSource,
    max_file_size: u64,
    deadline: Duration,
) -> Result<MediaInfo, JobError> {
    let options = ProbeOptions {
        flat_playlist: true,
        playlist_limit: PLAYLIST_ENTRY_LIMIT,
    };

    log::info!("Probing {} with {}", source, extractor.name());
    let raw = tokio::time::timeout(deadline, extractor.probe(source.as_str(), &options))
        .await
        .map_err(|_| JobError::Timeout {
            stage: "probe",
            after: deadline,
        })?
        .map_err(|e| {
            log::error!("Probe failed for {}: {}", source, e);
            e.into_probe_error()
        })?;

    build_catalog(raw, max_file_size)
}

/// Normalizes raw metadata into a [`MediaInfo`].
pub fn build_catalog(raw: RawMetadata, max_file_size: u64) -> Result<MediaInfo, JobError> {
    if let Some(entries) = raw.entries {
        let entries: Vec<PlaylistEntry> = entries
            .into_iter()
            .flatten()
            .take(PLAYLIST_ENTRY_LIMIT)
            .map(|entry| PlaylistEntry {
                title: non_blank(entry.title).unwrap_or_else(|| UNTITLED.to_string()),
                url: entry.url.or(entry.id).unwrap_or_default(),
                duration_seconds: seconds(entry.duration),
            })
            .collect();

        if entries.is_empty() {
            return Err(JobError::Probe("playlist has no available entries".to_string()));
        }

        return Ok(MediaInfo::Playlist {
            title: non_blank(raw.title).unwrap_or_else(|| UNTITLED_PLAYLIST.to_string()),
            entries,
        });
    }

    if raw.formats.is_empty() {
        return Err(JobError::Probe("source reported no streams".to_string()));
    }

    let total = raw.formats.len();
    let mut formats: Vec<FormatOption> = raw
        .formats
        .iter()
        .filter(|format| has_video_track(format))
        .map(to_option)
        .filter(|option| size_guard::admits(option.estimated_size_bytes, max_file_size))
        .collect();
    // Stable: equal qualities keep source order
    formats.sort_by(|a, b| b.quality.cmp(&a.quality));

    log::info!(
        "Catalog: {} of {} streams admitted (max {} bytes)",
        formats.len(),
        total,
        max_file_size
    );

    Ok(MediaInfo::SingleVideo {
        title: non_blank(raw.title).unwrap_or_else(|| UNTITLED.to_string()),
        duration_seconds: seconds(raw.duration),
        formats,
    })
}

fn has_video_track(format: &RawFormat) -> bool {
    format.vcodec.as_deref() != Some("none")
}

fn to_option(format: &RawFormat) -> FormatOption {
    // Negative or absent sizes carry no information
    let declared = format
        .filesize
        .filter(|size| *size > 0)
        .map(|size| size as u64)
        .or_else(|| {
            format
                .filesize_approx
                .filter(|size| size.is_finite() && *size > 0.0)
                .map(|size| size as u64)
        })
        .unwrap_or(0);

    FormatOption {
        format_id: format.format_id.clone().unwrap_or_default(),
        quality: format
            .height
            .and_then(|h| u32::try_from(h).ok())
            .unwrap_or(0),
        estimated_size_bytes: declared,
        extension: format.ext.clone().unwrap_or_else(|| "mp4".to_string()),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn seconds(duration: Option<f64>) -> u64 {
    duration
        .filter(|d| d.is_finite() && *d > 0.0)
        .map(|d| d as u64)
        .unwrap_or(0)
}
