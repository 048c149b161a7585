//! Dorafetch - Telegram bot that downloads media from a link and sends it back
//!
//! The core is the fetch-and-relay pipeline in [`download`]: probe a URL into a
//! format catalog, download the chosen format with yt-dlp, check it against
//! the upload ceiling, stream it back with progress updates, and always clean
//! up the temporary file.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging and formatting helpers
//! - `download`: The pipeline and its job orchestrator
//! - `telegram`: Telegram adapters (chat channel, keyboards, handlers)

pub mod core;
pub mod download;
pub mod telegram;

// Re-export commonly used types for convenience
pub use core::{config, AppError, AppResult, Config};
pub use download::{JobOrchestrator, JobRequest};
