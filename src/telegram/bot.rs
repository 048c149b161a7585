//! Bot initialization
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation

use reqwest::ClientBuilder;
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::core::config::{self, Config};
use crate::core::AppResult;

/// Bot commands enum with descriptions
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "I can do this:")]
pub enum Command {
    #[command(description = "welcome message")]
    Start,
    #[command(description = "how to use the bot")]
    Help,
    #[command(description = "download statistics")]
    Stats,
    #[command(description = "cancel your current download")]
    Cancel,
}

/// Creates a Bot instance with custom or default API URL
///
/// # Returns
/// * `Ok(Bot)` - Successfully created bot instance
/// * `Err(AppError)` - Failed to create bot (invalid URL, client build failure)
pub fn create_bot(config: &Config) -> AppResult<Bot> {
    let client = ClientBuilder::new().timeout(config::network::timeout()).build()?;
    let bot = Bot::with_client(config.bot_token(), client);

    // Local Bot API server lifts the 50 MB upload limit
    let bot = match &config.bot_api_url {
        Some(bot_api_url) => {
            log::info!("Using custom Bot API URL: {}", bot_api_url);
            bot.set_api_url(url::Url::parse(bot_api_url)?)
        }
        None => bot,
    };

    Ok(bot)
}

/// Creates the bot and checks the token against Telegram.
pub async fn connect_bot(config: &Config) -> AppResult<Bot> {
    let bot = create_bot(config)?;
    let me = bot.get_me().await?;
    log::info!("Logged in as @{}", me.username());
    Ok(bot)
}

/// Sets up bot commands in Telegram UI
pub async fn setup_bot_commands(bot: &Bot) -> Result<(), teloxide::RequestError> {
    bot.set_my_commands(Command::bot_commands()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::AppError;

    #[test]
    fn test_command_descriptions() {
        let command_list = Command::descriptions().to_string();
        assert!(command_list.contains("I can do this"));
        assert!(command_list.contains("start"));
        assert!(command_list.contains("stats"));
        assert!(command_list.contains("cancel"));
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start", "dorafetch_bot").unwrap(), Command::Start);
        assert_eq!(Command::parse("/stats", "dorafetch_bot").unwrap(), Command::Stats);
        assert!(Command::parse("/unknown", "dorafetch_bot").is_err());
    }

    #[test]
    fn test_create_bot_rejects_bad_api_url() {
        let mut config = Config::for_dir(std::env::temp_dir());
        config.bot_api_url = Some("not a url".to_string());
        assert!(matches!(create_bot(&config), Err(AppError::Url(_))));
    }

    #[test]
    fn test_create_bot_with_api_url() {
        let mut config = Config::for_dir(std::env::temp_dir());
        config.bot_api_url = Some("http://localhost:8081".to_string());
        let bot = create_bot(&config).unwrap();
        assert_eq!(bot.api_url().as_str(), "http://localhost:8081/");
    }
}
