//! Re-sync policy for items that may already be stored.
//!
//! Pure decision logic, separated from the Cypher so the policy is testable
//! without a database and shared by every store implementation.

use tweetgraph_common::{BookmarkItem, StoredTweet};

/// What `merge_item` must do for one incoming item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeAction {
    /// Not stored yet: full upsert of the tweet and all derived edges.
    Create,
    /// Stored truncated, incoming has full text: overwrite text, clear the
    /// truncation flag, re-create hashtag/mention edges from the new text.
    OverwriteText,
    /// Text unchanged, but the incoming capture knows the author and the
    /// stored tweet does not: attach the POSTED edge only.
    BackfillAuthor,
    /// Nothing to do; counts as a duplicate.
    Skip,
}

/// Decide how an incoming item reconciles against the stored copy.
///
/// Full text wins permanently: once a tweet is stored untruncated, a later
/// truncated capture never regresses it to partial text.
pub fn reconcile(existing: Option<&StoredTweet>, incoming: &BookmarkItem) -> MergeAction {
    let Some(existing) = existing else {
        return MergeAction::Create;
    };

    if existing.is_truncated && !incoming.is_truncated {
        return MergeAction::OverwriteText;
    }

    let incoming_has_author = incoming
        .author_username
        .as_deref()
        .is_some_and(|a| !a.trim().is_empty());
    if incoming_has_author && !existing.has_author {
        return MergeAction::BackfillAuthor;
    }

    MergeAction::Skip
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn item(id: &str, text: &str, truncated: bool, author: Option<&str>) -> BookmarkItem {
        BookmarkItem {
            id: id.to_string(),
            text: text.to_string(),
            is_truncated: truncated,
            author_username: author.map(String::from),
            hashtags: BTreeSet::new(),
            mentions: BTreeSet::new(),
            urls: Vec::new(),
            reply_to: None,
            quote_of: None,
            source_url: format!("https://x.com/i/status/{id}"),
            captured_at: Utc::now(),
            fetch_method: Default::default(),
        }
    }

    fn stored(id: &str, text: &str, truncated: bool, has_author: bool) -> StoredTweet {
        StoredTweet {
            id: id.to_string(),
            text: text.to_string(),
            is_truncated: truncated,
            has_author,
        }
    }

    #[test]
    fn unknown_id_creates() {
        let incoming = item("1", "hello", false, Some("alice"));
        assert_eq!(reconcile(None, &incoming), MergeAction::Create);
    }

    #[test]
    fn truncated_upgraded_by_full_capture() {
        let existing = stored("1", "partial…", true, true);
        let incoming = item("1", "the whole text.", false, Some("alice"));
        assert_eq!(reconcile(Some(&existing), &incoming), MergeAction::OverwriteText);
    }

    #[test]
    fn full_text_never_regresses_to_truncated() {
        let existing = stored("1", "the whole text.", false, true);
        let incoming = item("1", "partial…", true, Some("alice"));
        assert_eq!(reconcile(Some(&existing), &incoming), MergeAction::Skip);
    }

    #[test]
    fn author_backfilled_without_text_change() {
        let existing = stored("1", "the whole text.", false, false);
        let incoming = item("1", "the whole text.", false, Some("alice"));
        assert_eq!(reconcile(Some(&existing), &incoming), MergeAction::BackfillAuthor);
    }

    #[test]
    fn truncated_pair_backfills_author_but_keeps_text() {
        let existing = stored("1", "partial…", true, false);
        let incoming = item("1", "partial…", true, Some("alice"));
        assert_eq!(reconcile(Some(&existing), &incoming), MergeAction::BackfillAuthor);
    }

    #[test]
    fn blank_author_does_not_backfill() {
        let existing = stored("1", "the whole text.", false, false);
        let incoming = item("1", "the whole text.", false, Some("  "));
        assert_eq!(reconcile(Some(&existing), &incoming), MergeAction::Skip);
    }

    #[test]
    fn identical_resubmission_is_a_skip() {
        let existing = stored("1", "the whole text.", false, true);
        let incoming = item("1", "the whole text.", false, Some("alice"));
        assert_eq!(reconcile(Some(&existing), &incoming), MergeAction::Skip);
    }
}
