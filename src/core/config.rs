//! Runtime configuration.
//!
//! Everything the pipeline needs is read once at startup into a [`Config`] value
//! which is then handed to the orchestrator. Nothing here is a process-wide
//! global, so tests can run several orchestrators side by side with their own
//! temp directories and limits.

use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default upload ceiling (300 MiB)
pub const DEFAULT_MAX_FILE_SIZE_BYTES: u64 = 300 * 1024 * 1024;

/// Playlists are truncated to this many entries
pub const PLAYLIST_ENTRY_LIMIT: usize = 10;

/// Download configuration
pub mod download {
    use super::Duration;

    /// Timeout for yt-dlp metadata probes (in seconds)
    pub const PROBE_TIMEOUT_SECS: u64 = 60;

    /// Timeout for a full download + transcode (in seconds)
    pub const DOWNLOAD_TIMEOUT_SECS: u64 = 900; // 15 minutes

    /// Maximum number of concurrent downloads
    pub const MAX_CONCURRENT_DOWNLOADS: usize = 2;

    /// Audio extraction target
    pub const AUDIO_CODEC: &str = "mp3";
    pub const AUDIO_BITRATE_KBPS: u32 = 192;

    /// Container used when merging separate video and audio streams
    pub const VIDEO_CONTAINER: &str = "mp4";

    pub fn probe_timeout() -> Duration {
        Duration::from_secs(PROBE_TIMEOUT_SECS)
    }

    pub fn download_timeout() -> Duration {
        Duration::from_secs(DOWNLOAD_TIMEOUT_SECS)
    }
}

/// Upload progress configuration
pub mod progress {
    use super::Duration;

    /// Progress is reported every time this many percent have been uploaded
    pub const NOTIFY_STEP_PERCENT: u8 = 10;

    /// How often the relay samples the byte counter (in milliseconds)
    pub const POLL_INTERVAL_MS: u64 = 500;

    pub fn poll_interval() -> Duration {
        Duration::from_millis(POLL_INTERVAL_MS)
    }
}

/// Format keyboard configuration
pub mod keyboard {
    /// Formats below this height are not offered as buttons
    pub const MIN_QUALITY: u32 = 360;

    /// Buttons for formats above this estimated size get a warning sign (100 MiB)
    pub const LARGE_FILE_WARNING_BYTES: u64 = 100 * 1024 * 1024;
}

/// Network configuration
pub mod network {
    use super::Duration;

    /// Request timeout for Bot API calls (in seconds)
    /// Large uploads go through a single request, so this has to cover them
    pub const REQUEST_TIMEOUT_SECS: u64 = 900; // 15 minutes

    pub fn timeout() -> Duration {
        Duration::from_secs(REQUEST_TIMEOUT_SECS)
    }
}

/// Log file path
/// Read from LOG_FILE_PATH environment variable
/// Default: app.log
pub fn log_file_path() -> String {
    env::var("LOG_FILE_PATH").unwrap_or_else(|_| "app.log".to_string())
}

/// Errors raised while assembling the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BOT_TOKEN environment variable not set")]
    MissingToken,

    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("failed to create temp directory {}: {source}", path.display())]
    TempDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Pipeline configuration
#[derive(Debug)]
pub struct Config {
    /// Bot token (BOT_TOKEN or TELOXIDE_TOKEN)
    pub bot_token: SecretString,
    /// Custom Bot API server (BOT_API_URL), needed for uploads above 50 MB
    pub bot_api_url: Option<String>,
    /// yt-dlp binary (YTDL_BIN)
    pub ytdl_bin: String,
    /// Directory for in-flight downloads (TEMP_FILES_DIR)
    pub temp_dir: PathBuf,
    /// Upload ceiling in bytes (MAX_FILE_SIZE_MB)
    pub max_file_size: u64,
    /// Deadline for metadata probes (PROBE_TIMEOUT_SECS)
    pub probe_timeout: Duration,
    /// Deadline for downloads (DOWNLOAD_TIMEOUT_SECS)
    pub download_timeout: Duration,
    /// Worker pool capacity (MAX_CONCURRENT_DOWNLOADS)
    pub max_concurrent_downloads: usize,
    /// Relay sampling interval
    pub progress_poll_interval: Duration,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// Fails with [`ConfigError::MissingToken`] when neither `BOT_TOKEN` nor
    /// `TELOXIDE_TOKEN` is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bot_token = non_empty("BOT_TOKEN")
            .or_else(|| non_empty("TELOXIDE_TOKEN"))
            .ok_or(ConfigError::MissingToken)?;

        let temp_dir = non_empty("TEMP_FILES_DIR")
            .map(|dir| PathBuf::from(shellexpand::tilde(&dir).into_owned()))
            .unwrap_or_else(|| env::temp_dir().join("dorafetch"));

        let max_file_size = match non_empty("MAX_FILE_SIZE_MB") {
            Some(raw) => parse_number::<u64>("MAX_FILE_SIZE_MB", &raw)?
                .checked_mul(1024 * 1024)
                .filter(|bytes| *bytes > 0)
                .ok_or(ConfigError::InvalidValue {
                    name: "MAX_FILE_SIZE_MB",
                    value: raw,
                })?,
            None => DEFAULT_MAX_FILE_SIZE_BYTES,
        };

        let probe_timeout = match non_empty("PROBE_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number("PROBE_TIMEOUT_SECS", &raw)?),
            None => download::probe_timeout(),
        };

        let download_timeout = match non_empty("DOWNLOAD_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(parse_number("DOWNLOAD_TIMEOUT_SECS", &raw)?),
            None => download::download_timeout(),
        };

        let max_concurrent_downloads = match non_empty("MAX_CONCURRENT_DOWNLOADS") {
            Some(raw) => match parse_number::<usize>("MAX_CONCURRENT_DOWNLOADS", &raw)? {
                0 => {
                    return Err(ConfigError::InvalidValue {
                        name: "MAX_CONCURRENT_DOWNLOADS",
                        value: raw,
                    })
                }
                n => n,
            },
            None => download::MAX_CONCURRENT_DOWNLOADS,
        };

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            bot_api_url: non_empty("BOT_API_URL"),
            ytdl_bin: non_empty("YTDL_BIN").unwrap_or_else(|| "yt-dlp".to_string()),
            temp_dir,
            max_file_size,
            probe_timeout,
            download_timeout,
            max_concurrent_downloads,
            progress_poll_interval: progress::poll_interval(),
        })
    }

    /// Configuration rooted at `temp_dir` with defaults everywhere else.
    /// Does not touch the environment.
    pub fn for_dir(temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            bot_token: SecretString::from(String::new()),
            bot_api_url: None,
            ytdl_bin: "yt-dlp".to_string(),
            temp_dir: temp_dir.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE_BYTES,
            probe_timeout: download::probe_timeout(),
            download_timeout: download::download_timeout(),
            max_concurrent_downloads: download::MAX_CONCURRENT_DOWNLOADS,
            progress_poll_interval: progress::poll_interval(),
        }
    }

    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_progress_poll_interval(mut self, interval: Duration) -> Self {
        self.progress_poll_interval = interval;
        self
    }

    pub fn with_max_concurrent_downloads(mut self, n: usize) -> Self {
        self.max_concurrent_downloads = n.max(1);
        self
    }

    pub fn bot_token(&self) -> &str {
        self.bot_token.expose_secret()
    }

    /// Creates the temp directory if it does not exist yet.
    pub fn ensure_temp_dir(&self) -> Result<&Path, ConfigError> {
        std::fs::create_dir_all(&self.temp_dir).map_err(|source| ConfigError::TempDir {
            path: self.temp_dir.clone(),
            source,
        })?;
        Ok(&self.temp_dir)
    }
}

fn parse_number<T: std::str::FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        name,
        value: raw.to_string(),
    })
}
