//! Mock implementations for pipeline tests
//!
//! This module provides a scripted extractor and a recording chat channel so
//! the orchestrator can be exercised without yt-dlp or Telegram.

#![allow(dead_code)]

pub mod mock_channel;
pub mod mock_extractor;

pub use mock_channel::{ChannelEvent, MockChannel};
pub use mock_extractor::{FetchBehavior, MockExtractor, ProbeBehavior};

use std::path::Path;
use std::time::Duration;

pub const MIB: u64 = 1024 * 1024;

/// Number of entries in `dir`.
pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

/// Polls `condition` until it holds or two seconds pass.
pub async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..400 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
