//! Format/quality selectors and their translation into extractor fetch specs.

use std::fmt;

use crate::core::config::download::{AUDIO_BITRATE_KBPS, AUDIO_CODEC, VIDEO_CONTAINER};
use crate::download::extractor::{FetchSpec, PostProcess};

/// What kind of file the user gets back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }
}

/// The criterion used to choose which stream to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSelector {
    /// Best audio stream, transcoded to mp3
    Audio,
    /// Best video not taller than `max_quality` plus best audio, merged to mp4
    Video { max_quality: u32 },
}

impl FormatSelector {
    pub fn kind(&self) -> MediaKind {
        match self {
            FormatSelector::Audio => MediaKind::Audio,
            FormatSelector::Video { .. } => MediaKind::Video,
        }
    }

    /// Builds the yt-dlp format expression for this selector.
    ///
    /// The `filesize<?` filters keep streams of unknown size eligible. They are
    /// a hint to the extractor only: the size guard re-checks the real file.
    pub fn fetch_spec(&self, max_file_size: u64) -> FetchSpec {
        match *self {
            FormatSelector::Audio => FetchSpec {
                format: "bestaudio/best".to_string(),
                postprocess: PostProcess::ExtractAudio {
                    codec: AUDIO_CODEC,
                    bitrate_kbps: AUDIO_BITRATE_KBPS,
                },
            },
            FormatSelector::Video { max_quality } => FetchSpec {
                format: format!(
                    "bestvideo[height<={q}][filesize<?{max}]+bestaudio[filesize<?{max}]/best[height<={q}][filesize<?{max}]",
                    q = max_quality,
                    max = max_file_size
                ),
                postprocess: PostProcess::Merge {
                    container: VIDEO_CONTAINER,
                },
            },
        }
    }
}

impl fmt::Display for FormatSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatSelector::Audio => write!(f, "{} {}k", AUDIO_CODEC, AUDIO_BITRATE_KBPS),
            FormatSelector::Video { max_quality } => write!(f, "{}p {}", max_quality, VIDEO_CONTAINER),
        }
    }
}
