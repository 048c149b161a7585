//! Logging initialization and startup diagnostics

use anyhow::Result;
use simplelog::*;
use std::fs::File;

use crate::core::utils::format_size_lossy;

/// Initialize logger for both console and file output
///
/// # Arguments
/// * `log_file_path` - Path to the log file
pub fn init_logger(log_file_path: &str) -> Result<()> {
    let log_file = File::create(log_file_path).map_err(|e| anyhow::anyhow!("Failed to create log file: {}", e))?;

    CombinedLogger::init(vec![
        TermLogger::new(
            LevelFilter::Info,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), log_file),
    ])
    .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

    Ok(())
}

/// Logs the effective pipeline configuration at startup.
///
/// The bot token is never printed.
pub fn log_startup_configuration(config: &crate::core::config::Config) {
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("⚙️  Pipeline configuration");
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    log::info!("yt-dlp binary: {}", config.ytdl_bin);
    log::info!("Temp directory: {}", config.temp_dir.display());
    log::info!("Max file size: {}", format_size_lossy(config.max_file_size));
    log::info!(
        "Timeouts: probe {}s, download {}s",
        config.probe_timeout.as_secs(),
        config.download_timeout.as_secs()
    );
    log::info!("Concurrent downloads: {}", config.max_concurrent_downloads);
    match config.bot_api_url {
        Some(ref url) => log::info!("Bot API: {}", url),
        None => log::warn!("⚠️  BOT_API_URL not set: public Bot API caps uploads at 50 MB"),
    }
    log::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
