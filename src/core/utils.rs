/// Label shown instead of a size when the source did not report one
pub const UNKNOWN_SIZE_LABEL: &str = "unknown size";

const SIZE_UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Formats a byte count as a human-readable size with two decimals.
///
/// Zero means "the source did not say" and renders as [`UNKNOWN_SIZE_LABEL`].
/// Negative input has no meaningful unit and yields `None`.
///
/// # Example
///
/// ```
/// use dorafetch::core::utils::format_size;
///
/// assert_eq!(format_size(1536).as_deref(), Some("1.50 KB"));
/// assert_eq!(format_size(-1), None);
/// ```
pub fn format_size(bytes: i64) -> Option<String> {
    if bytes < 0 {
        return None;
    }
    if bytes == 0 {
        return Some(UNKNOWN_SIZE_LABEL.to_string());
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < SIZE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    Some(format!("{:.2} {}", value, SIZE_UNITS[unit]))
}

/// Formats an unsigned byte count, falling back to [`UNKNOWN_SIZE_LABEL`]
/// for values that do not fit the signed formatter.
pub fn format_size_lossy(bytes: u64) -> String {
    i64::try_from(bytes)
        .ok()
        .and_then(format_size)
        .unwrap_or_else(|| UNKNOWN_SIZE_LABEL.to_string())
}

/// Formats a duration in seconds as `H:MM:SS` or `M:SS`.
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}
