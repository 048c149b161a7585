//! Job orchestrator.
//!
//! Sequences one download job per request:
//!   acquire requester slot → worker permit → download → verify size → upload
//!   → cleanup → finalize → release slot
//!
//! Every stage error ends up here and becomes a terminal `Failed` state plus one
//! user-facing message. Whatever happened, the job's temp files are deleted
//! before the requester's registry entry is released.
//!
//! Deadlines count from the moment a probe or download starts waiting for a
//! worker, so time spent queued behind other downloads is part of the budget.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

use crate::core::config::progress::NOTIFY_STEP_PERCENT;
use crate::core::config::Config;
use crate::download::catalog::{self, MediaInfo, MediaSource};
use crate::download::cleanup::TempArtifact;
use crate::download::error::JobError;
use crate::download::executor::DownloadExecutor;
use crate::download::extractor::MediaExtractor;
use crate::download::job::{DownloadJob, JobState};
use crate::download::registry::{ActiveJobGuard, ConcurrencyRegistry};
use crate::download::relay::{ChatChannel, StatusHandle, UploadRelay};
use crate::download::selector::FormatSelector;
use crate::download::size_guard;
use crate::download::stats::{JobStats, StatsSnapshot};

pub const QUEUED_TEXT: &str = "⏳ Queued…";
pub const DOWNLOADING_TEXT: &str = "⬇️ Downloading…";
pub const DONE_TEXT: &str = "✅ Done!";

/// A user's choice, ready to run.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub requester_id: i64,
    pub chat_id: i64,
    pub source: MediaSource,
    pub selection: FormatSelector,
    /// Title from the probe, used as the upload caption
    pub title: Option<String>,
    /// Overrides the configured download deadline
    pub deadline: Option<Duration>,
}

impl JobRequest {
    pub fn new(requester_id: i64, chat_id: i64, source: MediaSource, selection: FormatSelector) -> Self {
        Self {
            requester_id,
            chat_id,
            source,
            selection,
            title: None,
            deadline: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// How a job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub state: JobState,
    /// Uploaded size on success
    pub file_size: Option<u64>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.state == JobState::Completed
    }
}

pub struct JobOrchestrator {
    config: Arc<Config>,
    extractor: Arc<dyn MediaExtractor>,
    channel: Arc<dyn ChatChannel>,
    executor: DownloadExecutor,
    relay: UploadRelay,
    registry: Arc<ConcurrencyRegistry>,
    workers: Semaphore,
    stats: JobStats,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl JobOrchestrator {
    pub fn new(config: Arc<Config>, extractor: Arc<dyn MediaExtractor>, channel: Arc<dyn ChatChannel>) -> Self {
        let executor = DownloadExecutor::new(Arc::clone(&extractor), config.max_file_size);
        let relay = UploadRelay::new(Arc::clone(&channel), config.progress_poll_interval, NOTIFY_STEP_PERCENT);
        Self {
            workers: Semaphore::new(config.max_concurrent_downloads),
            config,
            extractor,
            channel,
            executor,
            relay,
            registry: Arc::new(ConcurrencyRegistry::new()),
            stats: JobStats::new(),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Probes a source and builds its catalog. Read-only; does not touch the
    /// registry and runs no job.
    ///
    /// The deadline covers waiting for a worker as well as the probe itself.
    pub async fn probe(&self, source: &MediaSource, deadline: Option<Duration>) -> Result<MediaInfo, JobError> {
        let deadline = deadline.unwrap_or(self.config.probe_timeout);
        let bounded = tokio::time::timeout(deadline, async {
            let _permit = self.workers.acquire().await.map_err(|_| JobError::Cancelled)?;
            catalog::probe(self.extractor.as_ref(), source, self.config.max_file_size, deadline).await
        });
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(JobError::Cancelled),
            result = bounded => result.unwrap_or_else(|_| {
                log::warn!("Probe of {} timed out after {:?}", source, deadline);
                Err(JobError::Timeout { stage: "probe", after: deadline })
            }),
        }
    }

    /// Runs a job to completion on the current task.
    ///
    /// Returns `Err(AlreadyInProgress)` without doing anything if the requester
    /// is busy. Any other failure is reported through the outcome state.
    pub async fn run_job(&self, request: JobRequest) -> Result<JobOutcome, JobError> {
        let (guard, token) = self.admit(&request)?;
        Ok(self.execute(request, guard, token).await)
    }

    /// Like [`run_job`](Self::run_job) but on a tracked background task.
    /// Admission happens before this returns.
    pub fn spawn_job(self: &Arc<Self>, request: JobRequest) -> Result<JoinHandle<JobOutcome>, JobError> {
        let (guard, token) = self.admit(&request)?;
        let this = Arc::clone(self);
        Ok(self
            .tracker
            .spawn(async move { this.execute(request, guard, token).await }))
    }

    /// Cancels the requester's running job, if any.
    pub fn cancel(&self, requester_id: i64) -> bool {
        let cancelled = self.registry.cancel(requester_id);
        if cancelled {
            log::info!("Cancelling job of requester {}", requester_id);
        }
        cancelled
    }

    pub fn is_active(&self, requester_id: i64) -> bool {
        self.registry.is_active(requester_id)
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Cancels every job and waits for their cleanup to finish.
    pub async fn shutdown(&self) {
        log::info!("Shutting down: cancelling {} active job(s)", self.registry.active_count());
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        log::info!("All jobs finished");
    }

    fn admit(&self, request: &JobRequest) -> Result<(ActiveJobGuard, CancellationToken), JobError> {
        let token = self.shutdown.child_token();
        let Some(guard) = self.registry.try_acquire(request.requester_id, token.clone()) else {
            log::warn!(
                "Rejecting job for requester {}: already in progress",
                request.requester_id
            );
            self.stats.record_rejected();
            return Err(JobError::AlreadyInProgress(request.requester_id));
        };
        Ok((guard, token))
    }

    async fn execute(&self, request: JobRequest, guard: ActiveJobGuard, token: CancellationToken) -> JobOutcome {
        let mut job = DownloadJob::new(
            request.requester_id,
            request.chat_id,
            request.source.clone(),
            request.selection,
        );
        self.stats.record_started();
        log::info!(
            "Job {} created for requester {}: {} as {}",
            job.id,
            job.requester_id,
            job.source,
            job.chosen_format
        );

        let mut artifact = TempArtifact::for_job(&self.config.temp_dir, job.id);
        let status = match self.channel.send_status(job.chat_id, QUEUED_TEXT).await {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::warn!("Job {}: failed to send status message: {}", job.id, e);
                None
            }
        };

        let result = self
            .drive(&mut job, &request, &mut artifact, status.as_ref(), &token)
            .await;

        artifact.cleanup();
        job.local_file_path = None;

        let file_size = match result {
            Ok(size) => {
                job.advance(JobState::Completed);
                self.stats.record_success(size);
                self.report(job.chat_id, status.as_ref(), DONE_TEXT).await;
                Some(size)
            }
            Err(e) => {
                log::error!(
                    "Job {} (requester {}) failed [{}]: {}",
                    job.id,
                    job.requester_id,
                    e.subcategory(),
                    e
                );
                job.fail(e.kind());
                self.stats.record_failure();
                self.report(job.chat_id, status.as_ref(), &e.user_message()).await;
                None
            }
        };

        drop(guard);
        log::info!("Job {} finished in state {}", job.id, job.state);

        JobOutcome {
            job_id: job.id,
            state: job.state,
            file_size,
        }
    }

    async fn drive(
        &self,
        job: &mut DownloadJob,
        request: &JobRequest,
        artifact: &mut TempArtifact,
        status: Option<&StatusHandle>,
        cancel: &CancellationToken,
    ) -> Result<u64, JobError> {
        let deadline = request.deadline.unwrap_or(self.config.download_timeout);
        let expires = Instant::now() + deadline;

        let path = {
            let _permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(JobError::Cancelled),
                permit = tokio::time::timeout_at(expires, self.workers.acquire()) => match permit {
                    Ok(permit) => permit.map_err(|_| JobError::Cancelled)?,
                    Err(_) => {
                        log::warn!("Job {}: no worker free within {:?}", job.id, deadline);
                        return Err(JobError::Timeout { stage: "download", after: deadline });
                    }
                },
            };
            job.advance(JobState::Downloading);
            self.report(job.chat_id, status, DOWNLOADING_TEXT).await;
            let remaining = expires.saturating_duration_since(Instant::now());
            self.executor
                .download(&job.source, &job.chosen_format, artifact, remaining, cancel)
                .await
                .map_err(|e| match e {
                    JobError::Timeout { stage, .. } => JobError::Timeout { stage, after: deadline },
                    other => other,
                })?
        };
        job.local_file_path = Some(path.clone());

        job.advance(JobState::Verifying);
        let size = size_guard::verify(&path, self.config.max_file_size).await?;
        log::info!("Job {}: verified {} bytes", job.id, size);

        job.advance(JobState::Uploading);
        let caption = request.title.clone().unwrap_or_else(|| job.source.to_string());
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(JobError::Cancelled),
            result = self.relay.relay(&path, job.chat_id, status, job.chosen_format.kind(), &caption) => result,
        }
    }

    /// Best-effort status update: edits the job's status message, or posts a
    /// new one if there is none.
    async fn report(&self, chat_id: i64, status: Option<&StatusHandle>, text: &str) {
        let result = match status {
            Some(handle) => self.channel.edit_status(handle, text).await,
            None => self.channel.send_status(chat_id, text).await.map(|_| ()),
        };
        if let Err(e) = result {
            log::warn!("Failed to deliver status to chat {}: {}", chat_id, e);
        }
    }
}
