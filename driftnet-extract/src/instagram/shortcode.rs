//! Post identifier extraction from Instagram links.

use std::sync::LazyLock;

use driftnet_core::ExtractError;
use regex::Regex;

static SHORTCODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(p|tv|reel|reels/videos)/([A-Za-z0-9_-]+)").unwrap());

/// Returns the post shortcode in `link`.
///
/// # Errors
///
/// - `ExtractError::MalformedShortcode` - If no known post path segment is present
pub fn extract_shortcode(link: &str) -> Result<String, ExtractError> {
    SHORTCODE_PATTERN
        .captures(link)
        .and_then(|captures| captures.get(2))
        .map(|code| code.as_str().to_string())
        .ok_or_else(|| ExtractError::MalformedShortcode {
            url: link.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_path_segments() {
        let cases = [
            ("https://www.instagram.com/p/CzBjgFiISfF/", "CzBjgFiISfF"),
            ("https://www.instagram.com/reel/CzBjgFiISfF/?igsh=abc", "CzBjgFiISfF"),
            ("https://instagram.com/tv/B-x_y1/", "B-x_y1"),
            ("https://www.instagram.com/reels/videos/Cabc123/", "Cabc123"),
            ("https://www.instagram.com/someone/p/Cq1w2e3/", "Cq1w2e3"),
        ];
        for (link, expected) in cases {
            assert_eq!(extract_shortcode(link).unwrap(), expected, "{link}");
        }
    }

    #[test]
    fn test_profile_link_is_malformed() {
        let result = extract_shortcode("https://www.instagram.com/someone/");
        assert!(matches!(result, Err(ExtractError::MalformedShortcode { .. })));
    }
}
