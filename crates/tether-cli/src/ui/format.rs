//! Text formatting helpers for CLI output.

use chrono::{DateTime, Utc};

/// Truncate to at most `max_len` characters, ending in `...` when cut.
///
/// ```
/// use tether_cli::ui::format::truncate_str;
///
/// assert_eq!(truncate_str("Lighthouse", 20), "Lighthouse");
/// assert_eq!(truncate_str("Harbour walk", 8), "Harbo...");
/// ```
pub fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    if max_len <= 3 {
        return ".".repeat(max_len);
    }
    let kept: String = s.chars().take(max_len - 3).collect();
    format!("{}...", kept)
}

/// `1 connection`, `3 connections`.
pub fn count_noun(n: usize, singular: &str, plural: &str) -> String {
    if n == 1 {
        format!("{} {}", n, singular)
    } else {
        format!("{} {}", n, plural)
    }
}

/// Wall-clock time between two timestamps, e.g. `42ms` or `1.3s`.
pub fn format_elapsed(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let ms = end.signed_duration_since(start).num_milliseconds().max(0);
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.1}s", ms as f64 / 1000.0)
    }
}
