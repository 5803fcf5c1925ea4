//! Clock-style formatting for segment time ranges.

/// Format a duration in seconds as `M:SS` (minutes unpadded, seconds padded).
///
/// Fractional seconds are truncated; negative inputs render as `0:00`.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Render a `start - end` display range, e.g. `0:00 - 10:00`.
pub fn format_time_range(start: f64, end: f64) -> String {
    format!("{} - {}", format_clock(start), format_clock(end))
}
