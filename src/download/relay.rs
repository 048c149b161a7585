//! Upload relay: streams a finished file back to the chat with progress updates.
//!
//! The relay only knows the [`ChatChannel`] capability it is given. The
//! Telegram implementation lives in `telegram::channel`; tests use a recording
//! mock.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::task::AbortOnDropHandle;

use crate::download::error::JobError;
use crate::download::selector::MediaKind;

/// Error reported by a chat transport.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct ChannelError(pub String);

impl From<teloxide::RequestError> for ChannelError {
    fn from(err: teloxide::RequestError) -> Self {
        ChannelError(err.to_string())
    }
}

/// A status message that can be edited later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusHandle {
    pub chat_id: i64,
    pub message_id: i32,
}

/// Outbound chat capability.
#[async_trait]
pub trait ChatChannel: Send + Sync {
    /// Posts a new status message.
    async fn send_status(&self, chat_id: i64, text: &str) -> Result<StatusHandle, ChannelError>;

    /// Replaces the text of a status message.
    async fn edit_status(&self, status: &StatusHandle, text: &str) -> Result<(), ChannelError>;

    /// Uploads a file. Implementations must stream it and report bytes read
    /// through `progress`.
    async fn send_file(
        &self,
        chat_id: i64,
        path: &Path,
        kind: MediaKind,
        caption: &str,
        progress: UploadProgress,
    ) -> Result<(), ChannelError>;
}

/// Tracks the number of bytes sent during an upload.
///
/// Cloned into the reader that feeds the transport; the relay polls it.
#[derive(Clone, Default)]
pub struct UploadProgress {
    bytes_sent: Arc<AtomicU64>,
}

impl UploadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes(&self, bytes: usize) {
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent.load(Ordering::Relaxed)
    }
}

/// Monotonic progress threshold tracker.
///
/// In-flight notifications are multiples of `step` below 100; the next one
/// fires only once progress reaches the last notified threshold plus `step`.
/// 100 is reserved for [`ProgressThrottle::finish`], called after the
/// transport confirms the upload.
#[derive(Debug)]
pub struct ProgressThrottle {
    step: u8,
    next: u8,
    finished: bool,
}

impl ProgressThrottle {
    pub fn new(step: u8) -> Self {
        let step = step.clamp(1, 50);
        Self {
            step,
            next: step,
            finished: false,
        }
    }

    /// Returns the threshold to announce, if a new one was crossed.
    pub fn observe(&mut self, sent: u64, total: u64) -> Option<u8> {
        if total == 0 || self.finished {
            return None;
        }
        let percent = (sent.min(total) * 100 / total) as u8;
        let ceiling = (99 / self.step) * self.step;
        let threshold = ((percent / self.step) * self.step).min(ceiling);
        if threshold >= self.next {
            self.next = threshold.saturating_add(self.step);
            Some(threshold)
        } else {
            None
        }
    }

    /// Returns 100 the first time it is called.
    pub fn finish(&mut self) -> Option<u8> {
        if self.finished {
            None
        } else {
            self.finished = true;
            Some(100)
        }
    }
}

pub fn uploading_text(percent: u8) -> String {
    format!("📤 Uploading: {}%", percent)
}

pub struct UploadRelay {
    channel: Arc<dyn ChatChannel>,
    poll_interval: Duration,
    step: u8,
}

impl UploadRelay {
    pub fn new(channel: Arc<dyn ChatChannel>, poll_interval: Duration, step: u8) -> Self {
        Self {
            channel,
            poll_interval,
            step,
        }
    }

    /// Uploads `path` to `chat_id` and returns the number of bytes in the file.
    ///
    /// Progress is written into `status` when given. Failing to update it is
    /// logged and ignored; only a failed transfer is an error.
    pub async fn relay(
        &self,
        path: &Path,
        chat_id: i64,
        status: Option<&StatusHandle>,
        kind: MediaKind,
        caption: &str,
    ) -> Result<u64, JobError> {
        let total = tokio::fs::metadata(path)
            .await
            .map_err(|e| JobError::Relay(format!("cannot stat {}: {}", path.display(), e)))?
            .len();

        log::info!(
            "Uploading {} ({} bytes) to chat {} as {}",
            path.display(),
            total,
            chat_id,
            kind.as_str()
        );

        let progress = UploadProgress::new();
        let mut send = {
            let channel = Arc::clone(&self.channel);
            let path: PathBuf = path.to_path_buf();
            let caption = caption.to_string();
            let progress = progress.clone();
            AbortOnDropHandle::new(tokio::spawn(async move {
                channel.send_file(chat_id, &path, kind, &caption, progress).await
            }))
        };

        let mut throttle = ProgressThrottle::new(self.step);
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let outcome = loop {
            tokio::select! {
                joined = &mut send => break joined,
                _ = ticker.tick() => {
                    if let Some(percent) = throttle.observe(progress.bytes_sent(), total) {
                        self.notify(status, percent).await;
                    }
                }
            }
        };

        match outcome {
            Ok(Ok(())) => {
                if let Some(percent) = throttle.finish() {
                    self.notify(status, percent).await;
                }
                log::info!("Upload to chat {} finished: {} bytes", chat_id, total);
                Ok(total)
            }
            Ok(Err(e)) => {
                log::error!("Upload to chat {} failed: {}", chat_id, e);
                Err(JobError::Relay(e.to_string()))
            }
            Err(join_error) => {
                log::error!("Upload task for chat {} failed: {}", chat_id, join_error);
                Err(JobError::Relay(join_error.to_string()))
            }
        }
    }

    async fn notify(&self, status: Option<&StatusHandle>, percent: u8) {
        let Some(status) = status else {
            log::debug!("Upload progress {}% (no status message)", percent);
            return;
        };
        if let Err(e) = self.channel.edit_status(status, &uploading_text(percent)).await {
            log::warn!("Failed to update upload progress to {}%: {}", percent, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_throttle_fires_on_each_step() {
        let mut throttle = ProgressThrottle::new(10);
        assert_eq!(throttle.observe(5, 100), None);
        assert_eq!(throttle.observe(10, 100), Some(10));
        assert_eq!(throttle.observe(15, 100), None);
        assert_eq!(throttle.observe(19, 100), None);
        assert_eq!(throttle.observe(20, 100), Some(20));
    }

    #[test]
    fn test_throttle_jumps_to_highest_crossed_threshold() {
        let mut throttle = ProgressThrottle::new(10);
        assert_eq!(throttle.observe(47, 100), Some(40));
        assert_eq!(throttle.observe(49, 100), None);
        assert_eq!(throttle.observe(50, 100), Some(50));
    }

    #[test]
    fn test_throttle_never_goes_backwards() {
        let mut throttle = ProgressThrottle::new(10);
        assert_eq!(throttle.observe(60, 100), Some(60));
        assert_eq!(throttle.observe(30, 100), None);
        assert_eq!(throttle.observe(65, 100), None);
    }

    #[test]
    fn test_throttle_reserves_100_for_finish() {
        let mut throttle = ProgressThrottle::new(10);
        assert_eq!(throttle.observe(100, 100), Some(90));
        assert_eq!(throttle.observe(100, 100), None);
        assert_eq!(throttle.finish(), Some(100));
        assert_eq!(throttle.finish(), None);
        assert_eq!(throttle.observe(100, 100), None);
    }

    #[test]
    fn test_throttle_ignores_empty_total() {
        let mut throttle = ProgressThrottle::new(10);
        assert_eq!(throttle.observe(0, 0), None);
        assert_eq!(throttle.finish(), Some(100));
    }

    #[derive(Default)]
    struct ChunkedChannel {
        edits: Mutex<Vec<String>>,
        fail_upload: bool,
        fail_edits: bool,
    }

    #[async_trait]
    impl ChatChannel for ChunkedChannel {
        async fn send_status(&self, chat_id: i64, _text: &str) -> Result<StatusHandle, ChannelError> {
            Ok(StatusHandle { chat_id, message_id: 1 })
        }

        async fn edit_status(&self, _status: &StatusHandle, text: &str) -> Result<(), ChannelError> {
            if self.fail_edits {
                return Err(ChannelError("message is not modified".into()));
            }
            self.edits.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn send_file(
            &self,
            _chat_id: i64,
            path: &Path,
            _kind: MediaKind,
            _caption: &str,
            progress: UploadProgress,
        ) -> Result<(), ChannelError> {
            let total = std::fs::metadata(path).unwrap().len() as usize;
            for _ in 0..10 {
                progress.add_bytes(total / 10);
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            if self.fail_upload {
                Err(ChannelError("Request Entity Too Large".into()))
            } else {
                Ok(())
            }
        }
    }

    fn file_of(len: usize) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, vec![0u8; len]).unwrap();
        (dir, path)
    }

    const STATUS: StatusHandle = StatusHandle {
        chat_id: 7,
        message_id: 1,
    };

    #[tokio::test]
    async fn test_relay_reports_monotonic_progress_ending_at_100() {
        let (_dir, path) = file_of(1000);
        let channel = Arc::new(ChunkedChannel::default());
        let relay = UploadRelay::new(channel.clone(), Duration::from_millis(5), 10);

        let sent = relay
            .relay(&path, 7, Some(&STATUS), MediaKind::Video, "clip")
            .await
            .unwrap();
        assert_eq!(sent, 1000);

        let edits = channel.edits.lock().unwrap().clone();
        assert_eq!(edits.last().map(String::as_str), Some("📤 Uploading: 100%"));
        let percents: Vec<u32> = edits
            .iter()
            .map(|e| e.trim_start_matches("📤 Uploading: ").trim_end_matches('%').parse().unwrap())
            .collect();
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(percents.iter().filter(|p| **p == 100).count(), 1);
    }

    #[tokio::test]
    async fn test_relay_swallows_edit_failures() {
        let (_dir, path) = file_of(100);
        let channel = Arc::new(ChunkedChannel {
            fail_edits: true,
            ..Default::default()
        });
        let relay = UploadRelay::new(channel, Duration::from_millis(5), 10);
        assert!(relay
            .relay(&path, 7, Some(&STATUS), MediaKind::Audio, "a")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_relay_transfer_failure_is_relay_error() {
        let (_dir, path) = file_of(100);
        let channel = Arc::new(ChunkedChannel {
            fail_upload: true,
            ..Default::default()
        });
        let relay = UploadRelay::new(channel.clone(), Duration::from_millis(5), 10);
        let err = relay
            .relay(&path, 7, Some(&STATUS), MediaKind::Audio, "a")
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::Relay(_)));
        assert!(!channel
            .edits
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.ends_with("100%")));
    }
}
