//! Media fetch-and-relay pipeline

pub mod catalog;
pub mod cleanup;
pub mod error;
pub mod executor;
pub mod extractor;
pub mod job;
pub mod orchestrator;
pub mod registry;
pub mod relay;
pub mod selector;
pub mod size_guard;
pub mod stats;
pub mod ytdlp;

// Re-exports for convenience
pub use catalog::{FormatOption, MediaInfo, MediaSource, PlaylistEntry};
pub use error::{DownloadFailure, JobError, JobFailureKind};
pub use extractor::MediaExtractor;
pub use job::JobState;
pub use orchestrator::{JobOrchestrator, JobOutcome, JobRequest};
pub use relay::{ChatChannel, StatusHandle, UploadProgress};
pub use selector::{FormatSelector, MediaKind};
pub use ytdlp::YtDlpExtractor;
