//! Telegram implementation of the [`ChatChannel`] capability.

use async_trait::async_trait;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, MessageId};
use teloxide::RequestError;
use tokio::fs::File as TokioFile;
use tokio::io::{AsyncRead, ReadBuf};

use crate::download::relay::{ChannelError, ChatChannel, StatusHandle, UploadProgress};
use crate::download::selector::MediaKind;
use crate::telegram::Bot;

/// Telegram refuses captions longer than this
const MAX_CAPTION_CHARS: usize = 1024;

#[derive(Clone)]
pub struct TelegramChannel {
    bot: Bot,
}

impl TelegramChannel {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatChannel for TelegramChannel {
    async fn send_status(&self, chat_id: i64, text: &str) -> Result<StatusHandle, ChannelError> {
        let msg = self.bot.send_message(ChatId(chat_id), text).await?;
        Ok(StatusHandle {
            chat_id,
            message_id: msg.id.0,
        })
    }

    async fn edit_status(&self, status: &StatusHandle, text: &str) -> Result<(), ChannelError> {
        self.bot
            .edit_message_text(ChatId(status.chat_id), MessageId(status.message_id), text)
            .await?;
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
        let chat = ChatId(chat_id);
        if let Err(e) = self.bot.send_chat_action(chat, ChatAction::UploadDocument).await {
            log::warn!("Failed to send chat action: {}", e);
        }

        let input_file = input_file_with_progress(path, progress).await?;
        let caption: String = caption.chars().take(MAX_CAPTION_CHARS).collect();
        match kind {
            MediaKind::Audio => {
                self.bot.send_audio(chat, input_file).caption(caption).await?;
            }
            MediaKind::Video => {
                self.bot
                    .send_video(chat, input_file)
                    .caption(caption)
                    .supports_streaming(true)
                    .await?;
            }
        }
        Ok(())
    }
}

/// An `AsyncRead` wrapper that reports bytes read to an [`UploadProgress`].
pub struct ProgressReader<R> {
    inner: R,
    progress: UploadProgress,
}

impl<R> ProgressReader<R> {
    pub fn new(inner: R, progress: UploadProgress) -> Self {
        Self { inner, progress }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for ProgressReader<R> {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<std::io::Result<()>> {
        let before = buf.filled().len();
        let poll = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &poll {
            let after = buf.filled().len();
            if after > before {
                self.progress.add_bytes(after - before);
            }
        }
        poll
    }
}

/// Creates a streaming `InputFile` that counts the bytes Telegram reads.
pub async fn input_file_with_progress(path: &Path, progress: UploadProgress) -> Result<InputFile, RequestError> {
    let file = TokioFile::open(path)
        .await
        .map_err(|err| RequestError::Io(Arc::new(err)))?;
    let mut input_file = InputFile::read(ProgressReader::new(file, progress));
    if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
        input_file = input_file.file_name(name.to_string());
    }
    Ok(input_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_progress_reader_counts_bytes() {
        let data = vec![7u8; 10_000];
        let progress = UploadProgress::new();
        let mut reader = ProgressReader::new(&data[..], progress.clone());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out.len(), 10_000);
        assert_eq!(progress.bytes_sent(), 10_000);
    }

    #[tokio::test]
    async fn test_input_file_for_missing_path_is_io_error() {
        let err = input_file_with_progress(Path::new("/nonexistent/clip.mp4"), UploadProgress::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Io(_)));
    }
}
