//! Probe result rendering: the format keyboard and the playlist reply.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};

use crate::core::config::keyboard::{LARGE_FILE_WARNING_BYTES, MIN_QUALITY};
use crate::core::utils::{format_duration, format_size_lossy};
use crate::download::catalog::{FormatOption, MediaSource, PlaylistEntry};
use crate::download::selector::FormatSelector;
use crate::telegram::selection::{PendingSelection, SelectionStore};

pub const AUDIO_BUTTON_LABEL: &str = "🎵 Audio MP3";

/// Button label for a video format: `"{quality}p - {size}"`, with a warning
/// sign for large files.
pub fn format_label(option: &FormatOption) -> String {
    let label = format!(
        "{}p - {}",
        option.quality,
        format_size_lossy(option.estimated_size_bytes)
    );
    if option.estimated_size_bytes > LARGE_FILE_WARNING_BYTES {
        format!("⚠️ {}", label)
    } else {
        label
    }
}

/// Formats that get a button: one per distinct quality, at least
/// [`MIN_QUALITY`], in catalog order.
pub fn offered_formats(formats: &[FormatOption]) -> Vec<&FormatOption> {
    let mut seen = Vec::new();
    formats
        .iter()
        .filter(|f| f.quality >= MIN_QUALITY)
        .filter(|f| {
            if seen.contains(&f.quality) {
                false
            } else {
                seen.push(f.quality);
                true
            }
        })
        .collect()
}

/// Builds the selection keyboard: audio first, then one row per format.
pub fn format_keyboard(
    store: &SelectionStore,
    source: &MediaSource,
    title: &str,
    formats: &[FormatOption],
) -> InlineKeyboardMarkup {
    let pending = |selector| PendingSelection {
        source: source.clone(),
        selector,
        title: title.to_string(),
    };

    let mut rows = vec![vec![InlineKeyboardButton::callback(
        AUDIO_BUTTON_LABEL.to_string(),
        store.insert(pending(FormatSelector::Audio)),
    )]];

    for option in offered_formats(formats) {
        rows.push(vec![InlineKeyboardButton::callback(
            format_label(option),
            store.insert(pending(FormatSelector::Video {
                max_quality: option.quality,
            })),
        )]);
    }

    InlineKeyboardMarkup::new(rows)
}

/// Caption above the keyboard.
pub fn single_video_text(title: &str, duration_seconds: u64, offered: usize) -> String {
    let mut text = format!("🎬 {}", title);
    if duration_seconds > 0 {
        text.push_str(&format!(" ({})", format_duration(duration_seconds)));
    }
    if offered == 0 {
        text.push_str("\n\nNo video format available, audio only.");
    } else {
        text.push_str("\n\nChoose a format:");
    }
    text
}

/// Playlist reply: title plus a numbered list of entries.
pub fn playlist_text(title: &str, entries: &[PlaylistEntry]) -> String {
    let mut text = format!("📃 {}\n", title);
    for (i, entry) in entries.iter().enumerate() {
        text.push_str(&format!("\n{}. {}", i + 1, entry.title));
        if entry.duration_seconds > 0 {
            text.push_str(&format!(" ({})", format_duration(entry.duration_seconds)));
        }
        if !entry.url.is_empty() {
            text.push_str(&format!("\n{}", entry.url));
        }
    }
    text.push_str("\n\nSend a single video link to download it.");
    text
}
