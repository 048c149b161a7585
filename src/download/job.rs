//! Download job record and its state machine.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::download::catalog::MediaSource;
use crate::download::error::JobFailureKind;
use crate::download::selector::FormatSelector;

/// Lifecycle of a job.
///
/// `Queued → Probing → AwaitingSelection → Downloading → Verifying → Uploading → Completed`,
/// with `Failed` reachable from every non-terminal state.
///
/// `Probing` and `AwaitingSelection` belong to the probe flow: the bot probes
/// a link and shows the format keyboard before any job exists (see
/// [`JobOrchestrator::probe`](crate::download::JobOrchestrator::probe)).
/// Orchestrated jobs are created from a selection that was already made, so
/// they go straight from `Queued` to `Downloading`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Probing,
    AwaitingSelection,
    Downloading,
    Verifying,
    Uploading,
    Completed,
    Failed(JobFailureKind),
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed(_))
    }

    pub fn can_transition_to(&self, next: &JobState) -> bool {
        use JobState::*;
        match (self, next) {
            (from, Failed(_)) => !from.is_terminal(),
            (Queued, Probing)
            | (Queued, Downloading)
            | (Probing, AwaitingSelection)
            | (AwaitingSelection, Downloading)
            | (Downloading, Verifying)
            | (Verifying, Uploading)
            | (Uploading, Completed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Probing => write!(f, "probing"),
            JobState::AwaitingSelection => write!(f, "awaiting_selection"),
            JobState::Downloading => write!(f, "downloading"),
            JobState::Verifying => write!(f, "verifying"),
            JobState::Uploading => write!(f, "uploading"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed(kind) => write!(f, "failed({:?})", kind),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownloadJob {
    pub id: Uuid,
    pub requester_id: i64,
    pub chat_id: i64,
    pub source: MediaSource,
    pub chosen_format: FormatSelector,
    pub state: JobState,
    pub local_file_path: Option<PathBuf>,
    pub created_at: DateTime<Utc>,
}

impl DownloadJob {
    pub fn new(requester_id: i64, chat_id: i64, source: MediaSource, chosen_format: FormatSelector) -> Self {
        Self {
            id: Uuid::new_v4(),
            requester_id,
            chat_id,
            source,
            chosen_format,
            state: JobState::Queued,
            local_file_path: None,
            created_at: Utc::now(),
        }
    }

    /// Moves to `next`. Illegal transitions are logged and ignored, so a job
    /// can never leave a terminal state.
    pub fn advance(&mut self, next: JobState) -> bool {
        if !self.state.can_transition_to(&next) {
            log::warn!(
                "Job {} (requester {}): ignoring illegal transition {} -> {}",
                self.id,
                self.requester_id,
                self.state,
                next
            );
            return false;
        }
        log::info!(
            "Job {} (requester {}): {} -> {}",
            self.id,
            self.requester_id,
            self.state,
            next
        );
        self.state = next;
        true
    }

    pub fn fail(&mut self, kind: JobFailureKind) -> bool {
        self.advance(JobState::Failed(kind))
    }
}
