//! Telegram bot integration and handlers

pub mod bot;
pub mod channel;
pub mod handlers;
pub mod keyboard;
pub mod selection;

pub type Bot = teloxide::Bot;

// Re-exports for convenience
pub use bot::{connect_bot, create_bot, setup_bot_commands, Command};
pub use channel::TelegramChannel;
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use selection::SelectionStore;
