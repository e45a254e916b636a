//! Pure text extraction shared by the parser and the enrichment resolver.

use std::collections::BTreeSet;

/// Characters that legitimately end a complete tweet. Anything else at the
/// end of a long text suggests the capture was clipped mid-sentence.
const TERMINAL_CHARS: &[char] = &['.', '!', '?', '…', '"', '\'', ')', ']'];

/// Texts at or below this length are never flagged by the trailing-character
/// heuristic; short posts routinely end without punctuation.
const TRUNCATION_LENGTH_THRESHOLD: usize = 280;

/// Extract `#hashtags` from text. Case-preserving; exact duplicates removed.
pub fn extract_hashtags(text: &str) -> BTreeSet<String> {
    let re = regex::Regex::new(r"#(\w+)").expect("valid regex");
    re.captures_iter(text).map(|c| c[1].to_string()).collect()
}

/// Extract `@mentions` from text. Case-preserving; exact duplicates removed.
pub fn extract_mentions(text: &str) -> BTreeSet<String> {
    let re = regex::Regex::new(r"@(\w+)").expect("valid regex");
    re.captures_iter(text).map(|c| c[1].to_string()).collect()
}

/// Trailing-character truncation heuristic.
///
/// Applies only when no expand affordance was present on the element: text
/// longer than the threshold whose last non-whitespace character is not
/// sentence-terminal punctuation is treated as clipped.
pub fn looks_truncated(text: &str) -> bool {
    let trimmed = text.trim_end();
    if trimmed.chars().count() <= TRUNCATION_LENGTH_THRESHOLD {
        return false;
    }
    match trimmed.chars().last() {
        Some(last) => !TERMINAL_CHARS.contains(&last),
        None => false,
    }
}

/// Drop the query string (tracking params) from a URL.
pub fn strip_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => base.to_string(),
        None => url.to_string(),
    }
}

/// Whether a URL is a tweet permalink on the platform itself. These are
/// navigation anchors, not content links, and are excluded from `urls`.
pub fn is_status_permalink(url: &str) -> bool {
    (url.contains("x.com/") || url.contains("twitter.com/")) && url.contains("/status/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashtags_preserve_case_and_dedupe() {
        let tags = extract_hashtags("#AI #ai #AI");
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("AI"));
        assert!(tags.contains("ai"));
    }

    #[test]
    fn mentions_extracted_with_word_boundary() {
        let mentions = extract_mentions("cc @alice and @bob_2, also @alice");
        assert_eq!(mentions.len(), 2);
        assert!(mentions.contains("alice"));
        assert!(mentions.contains("bob_2"));
    }

    #[test]
    fn no_entities_in_plain_text() {
        assert!(extract_hashtags("nothing to see here").is_empty());
        assert!(extract_mentions("mail me at example.com").is_empty());
    }

    #[test]
    fn short_text_is_never_truncated() {
        assert!(!looks_truncated("short and abrupt"));
    }

    #[test]
    fn long_text_without_terminal_punctuation_is_truncated() {
        let text = "a".repeat(300);
        assert!(looks_truncated(&text));
    }

    #[test]
    fn long_text_ending_in_sentence_punctuation_is_complete() {
        let text = format!("{}.", "a".repeat(300));
        assert!(!looks_truncated(&text));
        let ellipsis = format!("{}…", "a".repeat(300));
        assert!(!looks_truncated(&ellipsis));
    }

    #[test]
    fn trailing_whitespace_is_ignored() {
        let text = format!("{}!   \n", "a".repeat(300));
        assert!(!looks_truncated(&text));
    }

    #[test]
    fn strip_query_removes_tracking_params() {
        assert_eq!(
            strip_query("https://example.com/post?utm_source=x"),
            "https://example.com/post"
        );
        assert_eq!(strip_query("https://example.com/post"), "https://example.com/post");
    }

    #[test]
    fn status_permalinks_are_recognized() {
        assert!(is_status_permalink("https://x.com/alice/status/123"));
        assert!(is_status_permalink("https://twitter.com/alice/status/123"));
        assert!(!is_status_permalink("https://example.com/status/123"));
        assert!(!is_status_permalink("https://x.com/alice"));
    }
}
