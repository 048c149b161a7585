use thiserror::Error;

use crate::core::config::ConfigError;

/// Centralized error types for the application
///
/// Job-level failures live in [`JobError`](crate::download::JobError) and never
/// escape the orchestrator; this enum covers startup of the Telegram front end.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors (missing token, bad numbers, temp dir)
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Telegram API errors
    #[error("Telegram error: {0}")]
    Telegram(#[from] teloxide::RequestError),

    /// HTTP client construction errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL parsing errors
    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),
}

/// Type alias for Result with AppError
pub type AppResult<T> = Result<T, AppError>;
