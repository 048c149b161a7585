//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::Message;

use super::commands::{handle_cancel_command, handle_help_command, handle_start_command, handle_stats_command};
use super::links::{handle_link_message, handle_selection_callback};
use super::types::{HandlerDeps, HandlerError};
use crate::telegram::bot::Command;
use crate::telegram::selection::CALLBACK_PREFIX;
use crate::telegram::Bot;

/// Creates the main dispatcher schema for the Telegram bot.
///
/// The same schema is used in production and can be used in integration tests.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_commands = deps.clone();
    let deps_messages = deps.clone();
    let deps_callback = deps;

    dptree::entry()
        .branch(command_handler(deps_commands))
        .branch(message_handler(deps_messages))
        .branch(callback_handler(deps_callback))
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message().branch(dptree::entry().filter_command::<Command>().endpoint(
        move |bot: Bot, msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                log::info!("Received command: {:?} from chat {}", cmd, msg.chat.id);

                match cmd {
                    Command::Start => handle_start_command(&bot, &msg, &deps).await?,
                    Command::Help => handle_help_command(&bot, &msg).await?,
                    Command::Stats => handle_stats_command(&bot, &msg, &deps).await?,
                    Command::Cancel => handle_cancel_command(&bot, &msg, &deps).await?,
                }
                Ok(())
            }
        },
    ))
}

fn message_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.text().is_some_and(|text| !text.starts_with('/')))
        .endpoint(move |bot: Bot, msg: Message| {
            let deps = deps.clone();
            async move { handle_link_message(&bot, &msg, &deps).await }
        })
}

fn callback_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_callback_query()
        .filter(|q: CallbackQuery| {
            q.data
                .as_deref()
                .is_some_and(|data| data.starts_with(CALLBACK_PREFIX))
        })
        .endpoint(move |bot: Bot, q: CallbackQuery| {
            let deps = deps.clone();
            async move { handle_selection_callback(&bot, &q, &deps).await }
        })
}
