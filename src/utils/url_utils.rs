//! URL validity checks shared across processor stages.

/// Reject empty strings and non-`http(s)` schemes (`data:`, `javascript:`,
/// `mailto:`, and anything `url::Url` can't parse).
#[must_use]
pub fn is_valid_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }

    if url.starts_with("data:") || url.starts_with("javascript:") || url.starts_with("mailto:") {
        return false;
    }

    match url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_javascript_scheme() {
        assert!(!is_valid_url("javascript:void(0)"));
    }

    #[test]
    fn rejects_empty() {
        assert!(!is_valid_url(""));
    }

    #[test]
    fn accepts_https() {
        assert!(is_valid_url("https://example.com/page"));
    }
}
