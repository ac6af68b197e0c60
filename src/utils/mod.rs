use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use regex::Regex;

/// Longest title (in characters) that survives sanitizing
pub const MAX_TITLE_CHARS: usize = 50;

/// Get current Unix timestamp in seconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn disallowed_title_chars() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^[:alnum:]\s]").expect("title pattern is valid"))
}

/// Strip everything except ASCII letters, digits and whitespace, then cap the
/// result at [`MAX_TITLE_CHARS`].
pub fn sanitize_title(raw: &str) -> String {
    disallowed_title_chars()
        .replace_all(raw, "")
        .chars()
        .take(MAX_TITLE_CHARS)
        .collect()
}

/// Title used when the resolved one sanitizes down to nothing
pub fn fallback_title() -> String {
    format!("audio {}", get_timestamp())
}

/// Human readable size, e.g. "0 Bytes", "1.5 KB", "2 MB"
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 3] = ["Bytes", "KB", "MB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
