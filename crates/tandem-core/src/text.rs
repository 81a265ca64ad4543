//! Text safety helpers for context folding and log records.

/// Marker appended when a text was cut off.
pub const TRUNCATION_MARKER: &str = "\n\n[... truncated ...]";

/// Truncate `text` to at most `max_bytes` bytes without splitting a UTF-8
/// character. Returns the (possibly truncated) text and whether truncation
/// happened. Truncated text carries the truncation marker so downstream
/// agents can see that content was cut.
pub fn truncate_bytes(text: &str, max_bytes: usize) -> (String, bool) {
    if text.len() <= max_bytes {
        return (text.to_string(), false);
    }

    let mut cut = max_bytes;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }

    let mut out = text[..cut].to_string();
    out.push_str(TRUNCATION_MARKER);
    (out, true)
}
