use std::time::Duration;
use thiserror::Error;

use crate::core::utils::format_size_lossy;

/// Why the extractor failed, as far as its stderr tells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadFailure {
    /// Private, removed or geo-restricted media
    Unavailable,
    /// Requested format/quality does not exist for this media
    FormatUnavailable,
    /// Timeouts, DNS, refused connections
    Network,
    /// The extractor does not know this site
    Unsupported,
    /// Anything else, including a missing output file
    Other,
}

/// Structured error type for a download job.
///
/// Each pipeline stage returns one of these; the orchestrator turns them into
/// a terminal job state and a user-facing message. None of them escape a job.
#[derive(Debug, Error)]
pub enum JobError {
    /// The source could not be resolved or has no usable streams
    #[error("probe failed: {0}")]
    Probe(String),

    /// The extractor failed to produce a file
    #[error("download failed: {detail}")]
    Download { reason: DownloadFailure, detail: String },

    /// The downloaded file is larger than the upload ceiling
    #[error("file is {actual} bytes, limit is {limit} bytes")]
    ExceedsLimit { actual: u64, limit: u64 },

    /// The chat transport rejected the upload
    #[error("upload failed: {0}")]
    Relay(String),

    /// The requester already has a job running
    #[error("requester {0} already has an active download")]
    AlreadyInProgress(i64),

    /// A probe or download ran past its deadline
    #[error("{stage} timed out after {}s", .after.as_secs())]
    Timeout { stage: &'static str, after: Duration },

    /// The job was aborted (shutdown or explicit cancel)
    #[error("job cancelled")]
    Cancelled,
}

/// Copyable tag of a [`JobError`], stored in the terminal job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFailureKind {
    Probe,
    Download,
    ExceedsLimit,
    Relay,
    AlreadyInProgress,
    Timeout,
    Cancelled,
}

impl JobError {
    pub fn download(reason: DownloadFailure, detail: impl Into<String>) -> Self {
        JobError::Download {
            reason,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> JobFailureKind {
        match self {
            JobError::Probe(_) => JobFailureKind::Probe,
            JobError::Download { .. } => JobFailureKind::Download,
            JobError::ExceedsLimit { .. } => JobFailureKind::ExceedsLimit,
            JobError::Relay(_) => JobFailureKind::Relay,
            JobError::AlreadyInProgress(_) => JobFailureKind::AlreadyInProgress,
            JobError::Timeout { .. } => JobFailureKind::Timeout,
            JobError::Cancelled => JobFailureKind::Cancelled,
        }
    }

    /// Returns subcategory for logs and stats
    pub fn subcategory(&self) -> &'static str {
        match self {
            JobError::Probe(_) => "probe",
            JobError::Download { .. } => "download",
            JobError::ExceedsLimit { .. } => "exceeds_limit",
            JobError::Relay(_) => "relay",
            JobError::AlreadyInProgress(_) => "already_in_progress",
            JobError::Timeout { .. } => "timeout",
            JobError::Cancelled => "cancelled",
        }
    }

    /// Message shown to the user. Never contains extractor output or paths.
    pub fn user_message(&self) -> String {
        match self {
            JobError::Probe(_) => "❌ Could not read this link. Check the URL and try again.".to_string(),
            JobError::Download { reason, .. } => match reason {
                DownloadFailure::Unavailable => {
                    "❌ Download failed: the media is private, removed or not available in this region.".to_string()
                }
                DownloadFailure::FormatUnavailable => {
                    "❌ Download failed: the selected quality is not available.".to_string()
                }
                DownloadFailure::Network => "❌ Download failed: network error, try again later.".to_string(),
                DownloadFailure::Unsupported => "❌ Download failed: this site is not supported.".to_string(),
                DownloadFailure::Other => "❌ Download failed: extraction failed.".to_string(),
            },
            JobError::ExceedsLimit { actual, limit } => format!(
                "❌ File is too large ({}). Maximum allowed size is {}.",
                format_size_lossy(*actual),
                format_size_lossy(*limit)
            ),
            JobError::Relay(_) => "❌ Upload failed. Please try again.".to_string(),
            JobError::AlreadyInProgress(_) => {
                "⏳ You already have a download in progress. Wait for it to finish.".to_string()
            }
            JobError::Timeout { stage, .. } => format!("⌛ The {} took too long and was stopped.", stage),
            JobError::Cancelled => "🛑 Download cancelled.".to_string(),
        }
    }
}
