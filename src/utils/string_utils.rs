//! UTF-8-safe string truncation, respecting character boundaries so
//! multi-byte characters (box-drawing symbols, emoji) never panic a slice.

/// Truncate `s` to at most `max_chars` Unicode characters (not bytes).
///
/// ```
/// use scrapetrellis::utils::string_utils::safe_truncate_chars;
/// assert_eq!(safe_truncate_chars("Hello, World!", 5), "Hello");
/// assert_eq!(safe_truncate_chars("Hi", 100), "Hi");
/// ```
#[inline]
#[must_use]
pub fn safe_truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((byte_idx, _)) => &s[..byte_idx],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_multibyte_characters_without_panicking() {
        let emoji = "\u{1F389}\u{1F38A}\u{1F388}";
        assert_eq!(safe_truncate_chars(emoji, 2), "\u{1F389}\u{1F38A}");
    }
}
