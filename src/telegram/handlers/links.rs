//! Link messages and format selection callbacks

use teloxide::prelude::*;
use teloxide::types::{Message, MessageId};

use super::types::{HandlerDeps, HandlerError};
use crate::download::catalog::{MediaInfo, MediaSource};
use crate::download::orchestrator::JobRequest;
use crate::telegram::keyboard::{format_keyboard, offered_formats, playlist_text, single_video_text};
use crate::telegram::Bot;

pub(super) const ANALYZING_TEXT: &str = "🔍 Analyzing…";
pub(super) const EXPIRED_SELECTION_TEXT: &str = "This button has expired, send the link again.";

/// First http(s) URL in a message text.
pub(super) fn extract_source(text: &str) -> Option<MediaSource> {
    text.split_whitespace()
        .filter(|word| word.starts_with("http://") || word.starts_with("https://"))
        .find_map(|word| MediaSource::parse(word).ok())
}

/// Handles a message containing a link: probes it in the background and
/// answers with either a playlist summary or a format keyboard.
pub(super) async fn handle_link_message(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let Some(source) = msg.text().and_then(extract_source) else {
        bot.send_message(msg.chat.id, "Send me a link to a video.").await?;
        return Ok(());
    };

    log::info!("Link from chat {}: {}", msg.chat.id, source);
    let status = bot.send_message(msg.chat.id, ANALYZING_TEXT).await?;

    let bot = bot.clone();
    let deps = deps.clone();
    let chat_id = msg.chat.id;
    tokio::spawn(async move {
        if let Err(e) = answer_probe(&bot, chat_id, status.id, &source, &deps).await {
            log::error!("Failed to answer probe of {} in chat {}: {}", source, chat_id, e);
        }
    });
    Ok(())
}

async fn answer_probe(
    bot: &Bot,
    chat_id: ChatId,
    status_id: MessageId,
    source: &MediaSource,
    deps: &HandlerDeps,
) -> Result<(), teloxide::RequestError> {
    match deps.orchestrator.probe(source, None).await {
        Ok(MediaInfo::Playlist { title, entries }) => {
            bot.edit_message_text(chat_id, status_id, playlist_text(&title, &entries))
                .await?;
        }
        Ok(MediaInfo::SingleVideo {
            title,
            duration_seconds,
            formats,
        }) => {
            let offered = offered_formats(&formats).len();
            let keyboard = format_keyboard(&deps.selections, source, &title, &formats);
            bot.edit_message_text(chat_id, status_id, single_video_text(&title, duration_seconds, offered))
                .reply_markup(keyboard)
                .await?;
        }
        Err(e) => {
            log::warn!("Probe of {} failed: {}", source, e);
            bot.edit_message_text(chat_id, status_id, e.user_message()).await?;
        }
    }
    Ok(())
}

/// Handles a format button press: resolves the token and starts a job.
pub(super) async fn handle_selection_callback(
    bot: &Bot,
    q: &CallbackQuery,
    deps: &HandlerDeps,
) -> Result<(), HandlerError> {
    let selection = q.data.as_deref().and_then(|data| deps.selections.resolve(data));
    let Some(selection) = selection else {
        bot.answer_callback_query(q.id.clone())
            .text(EXPIRED_SELECTION_TEXT)
            .await?;
        return Ok(());
    };

    if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
        log::warn!("Failed to answer callback query: {}", e);
    }

    let requester_id = i64::try_from(q.from.id.0)?;
    let chat_id = q
        .message
        .as_ref()
        .map(|m| m.chat().id.0)
        .unwrap_or(requester_id);

    let request = JobRequest::new(requester_id, chat_id, selection.source, selection.selector)
        .with_title(selection.title);

    match deps.orchestrator.spawn_job(request) {
        Ok(_) => log::info!("Started job for requester {} in chat {}", requester_id, chat_id),
        Err(e) => {
            bot.send_message(ChatId(chat_id), e.user_message()).await?;
        }
    }
    Ok(())
}
