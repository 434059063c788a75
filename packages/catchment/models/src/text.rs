//! Helpers for logging provider responses.

/// Truncates `s` to at most `max_len` bytes on a char boundary, appending
/// "..." when anything was cut.
#[must_use]
pub fn truncate_for_log(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let end = (0..=max_len)
        .rev()
        .find(|i| s.is_char_boundary(*i))
        .unwrap_or(0);
    format!("{}...", &s[..end])
}
