//! Recording [`ChatChannel`] for tests
//!
//! Uploads read the file in chunks and report progress the way the Telegram
//! reader does, so the relay's throttling can be observed.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::AsyncReadExt;

use dorafetch::download::relay::ChannelError;
use dorafetch::download::{ChatChannel, MediaKind, StatusHandle, UploadProgress};

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Status { chat_id: i64, text: String },
    Edit { message_id: i32, text: String },
    File { chat_id: i64, path: PathBuf, kind: MediaKind, caption: String },
}

#[derive(Default)]
pub struct MockChannel {
    events: Mutex<Vec<ChannelEvent>>,
    next_message_id: AtomicI32,
    pub fail_upload: bool,
    pub fail_edits: bool,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_upload() -> Self {
        Self {
            fail_upload: true,
            ..Default::default()
        }
    }

    pub fn failing_edits() -> Self {
        Self {
            fail_edits: true,
            ..Default::default()
        }
    }

    pub fn events(&self) -> Vec<ChannelEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn uploads(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, ChannelEvent::File { .. }))
            .count()
    }

    /// Every status text, posted or edited, in order.
    pub fn texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ChannelEvent::Status { text, .. } | ChannelEvent::Edit { text, .. } => Some(text),
                ChannelEvent::File { .. } => None,
            })
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }

    fn record(&self, event: ChannelEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl ChatChannel for MockChannel {
    async fn send_status(&self, chat_id: i64, text: &str) -> Result<StatusHandle, ChannelError> {
        self.record(ChannelEvent::Status {
            chat_id,
            text: text.to_string(),
        });
        let message_id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(StatusHandle { chat_id, message_id })
    }

    async fn edit_status(&self, status: &StatusHandle, text: &str) -> Result<(), ChannelError> {
        if self.fail_edits {
            return Err(ChannelError("Bad Request: message to edit not found".into()));
        }
        self.record(ChannelEvent::Edit {
            message_id: status.message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_file(
        &self,
        chat_id: i64,
        path: &Path,
        kind: MediaKind,
        caption: &str,
        progress: UploadProgress,
    ) -> Result<(), ChannelError> {
        let mut file = tokio::fs::File::open(path)
            .await
            .map_err(|e| ChannelError(e.to_string()))?;
        let mut buf = vec![0u8; 64 * 1024];
        loop {
            let n = file.read(&mut buf).await.map_err(|e| ChannelError(e.to_string()))?;
            if n == 0 {
                break;
            }
            progress.add_bytes(n);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }

        if self.fail_upload {
            return Err(ChannelError("Bad Request: Request Entity Too Large".into()));
        }
        self.record(ChannelEvent::File {
            chat_id,
            path: path.to_path_buf(),
            kind,
            caption: caption.to_string(),
        });
        Ok(())
    }
}
