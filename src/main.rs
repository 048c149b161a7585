use anyhow::Result;
use dotenvy::dotenv;
use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::update_listeners::Polling;

use dorafetch::core::{config, init_logger, log_startup_configuration, AppResult, Config};
use dorafetch::download::{JobOrchestrator, YtDlpExtractor};
use dorafetch::telegram::{connect_bot, schema, setup_bot_commands, HandlerDeps, SelectionStore, TelegramChannel};

/// Main entry point for the Telegram bot
///
/// # Errors
/// Returns an error if initialization fails (logging, configuration, bot creation).
#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present
    let _ = dotenv();

    // Initialize logger (console + file)
    init_logger(&config::log_file_path())?;

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Startup failed: {}", e);
            return Err(e.into());
        }
    };
    log_startup_configuration(&config);
    let config = Arc::new(config);

    let bot = match connect_bot(&config).await {
        Ok(bot) => bot,
        Err(e) => {
            log::error!("Failed to connect to Telegram: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = setup_bot_commands(&bot).await {
        log::warn!("Failed to set bot commands: {}", e);
    }

    let extractor = Arc::new(YtDlpExtractor::new(config.ytdl_bin.clone()));
    let channel = Arc::new(TelegramChannel::new(bot.clone()));
    let orchestrator = Arc::new(JobOrchestrator::new(Arc::clone(&config), extractor, channel));
    let deps = HandlerDeps::new(Arc::clone(&orchestrator), Arc::new(SelectionStore::default()));

    log::info!("Starting dispatcher");
    let listener = Polling::builder(bot.clone()).drop_pending_updates().build();
    Dispatcher::builder(bot, schema(deps))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("An error from the update listener"),
        )
        .await;

    log::info!("Dispatcher stopped");
    orchestrator.shutdown().await;
    log::info!("Final stats: {}", orchestrator.stats());

    Ok(())
}

/// Reads the configuration and prepares the temp directory.
fn load_config() -> AppResult<Config> {
    let config = Config::from_env()?;
    config.ensure_temp_dir()?;
    Ok(config)
}
