//! Command handler implementations (/start, /help, /stats, /cancel)

use teloxide::prelude::*;
use teloxide::types::Message;

use super::types::{HandlerDeps, HandlerError};
use crate::core::utils::format_size_lossy;
use crate::download::stats::StatsSnapshot;
use crate::telegram::Bot;

pub(super) fn welcome_text(max_file_size: u64) -> String {
    format!(
        "👋 Hi! Send me a link to a video and I will send the file back.\n\n\
         You can pick a video quality or just the audio as MP3. Files up to {} are supported.",
        format_size_lossy(max_file_size)
    )
}

pub(super) fn help_text() -> &'static str {
    "1. Send a link (YouTube and most other video sites work).\n\
     2. Pick a format from the buttons.\n\
     3. Wait for the upload to finish.\n\n\
     One download at a time per user. /cancel stops the current one, /stats shows counters."
}

pub(super) fn stats_text(snapshot: &StatsSnapshot) -> String {
    format!(
        "📊 Downloads\n\nTotal: {}\nSuccessful: {}\nFailed: {}\nRunning: {}\nRejected (busy): {}\nUploaded: {}",
        snapshot.total,
        snapshot.successful,
        snapshot.failed,
        snapshot.in_flight(),
        snapshot.rejected,
        format_size_lossy(snapshot.bytes_uploaded)
    )
}

/// Handle /start command
pub(super) async fn handle_start_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let max = deps.orchestrator.config().max_file_size;
    bot.send_message(msg.chat.id, welcome_text(max)).await?;
    Ok(())
}

/// Handle /help command
pub(super) async fn handle_help_command(bot: &Bot, msg: &Message) -> Result<(), HandlerError> {
    bot.send_message(msg.chat.id, help_text()).await?;
    Ok(())
}

/// Handle /stats command
pub(super) async fn handle_stats_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let snapshot = deps.orchestrator.stats();
    bot.send_message(msg.chat.id, stats_text(&snapshot)).await?;
    Ok(())
}

/// Handle /cancel command
pub(super) async fn handle_cancel_command(bot: &Bot, msg: &Message, deps: &HandlerDeps) -> Result<(), HandlerError> {
    let requester_id = msg.from.as_ref().and_then(|u| i64::try_from(u.id.0).ok()).unwrap_or(msg.chat.id.0);
    let text = if deps.orchestrator.cancel(requester_id) {
        "🛑 Cancelling your download…"
    } else {
        "Nothing to cancel."
    };
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}
