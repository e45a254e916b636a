use std::collections::{BTreeSet, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of ids the watermark remembers between runs.
pub const SEEN_IDS_CAPACITY: usize = 1000;

/// Cap on external URLs kept per bookmark.
pub const MAX_URLS_PER_ITEM: usize = 5;

/// How a bookmark's text was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMethod {
    /// Scraped from the rendered feed. May be truncated.
    #[default]
    Browser,
    /// Repaired from the enrichment API. Always full text.
    Api,
}

/// Collection mode for a sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Walk the whole feed, ignoring the watermark.
    Full,
    /// Stop as soon as a previously-seen id reappears.
    Incremental,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
        }
    }

    /// Hard cap on scroll/capture passes per run.
    pub fn max_passes(&self) -> u32 {
        match self {
            SyncMode::Full => 500,
            SyncMode::Incremental => 50,
        }
    }
}

impl std::str::FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(SyncMode::Full),
            "incremental" => Ok(SyncMode::Incremental),
            other => Err(format!("unknown sync mode '{other}' (expected full|incremental)")),
        }
    }
}

/// One scraped (and possibly enriched) bookmark.
///
/// `id` is assigned by the upstream platform and globally unique; re-capturing
/// the same id must never produce a second logical item downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkItem {
    pub id: String,
    /// UTF-8 tweet text. Partial when `is_truncated` is set.
    pub text: String,
    pub is_truncated: bool,
    pub author_username: Option<String>,
    /// Case-preserving, duplicate-free.
    pub hashtags: BTreeSet<String>,
    pub mentions: BTreeSet<String>,
    /// External links only, query-stripped, capped at [`MAX_URLS_PER_ITEM`].
    pub urls: Vec<String>,
    /// Id of the tweet this one replies to. Target may not be stored yet.
    pub reply_to: Option<String>,
    /// Id of the tweet this one quotes. Target may not be stored yet.
    pub quote_of: Option<String>,
    /// Canonical permalink.
    pub source_url: String,
    /// When we captured it, not when it was authored.
    pub captured_at: DateTime<Utc>,
    #[serde(default)]
    pub fetch_method: FetchMethod,
}

/// Persisted cursor marking how far previous runs progressed.
///
/// Loaded at collector start, mutated only after items reach storage, and
/// written back atomically at the end of every run (including no-op runs, so
/// the attempt itself is recorded).
#[derive(Debug, Clone, Default)]
pub struct SyncWatermark {
    seen: VecDeque<String>,
    index: HashSet<String>,
    pub last_item_id: Option<String>,
    pub last_run_at: Option<DateTime<Utc>>,
    /// Items received by the most recent run.
    pub total_bookmarks: u64,
    /// Mode of the most recent run.
    pub mode: Option<String>,
}

impl SyncWatermark {
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    /// Remember an id that was delivered to storage. Oldest ids are evicted
    /// once [`SEEN_IDS_CAPACITY`] is reached.
    pub fn record(&mut self, id: &str) {
        if self.index.contains(id) {
            return;
        }
        self.seen.push_back(id.to_string());
        self.index.insert(id.to_string());
        while self.seen.len() > SEEN_IDS_CAPACITY {
            if let Some(evicted) = self.seen.pop_front() {
                self.index.remove(&evicted);
            }
        }
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Seen ids in insertion order (oldest first), for persistence.
    pub fn seen_ids(&self) -> impl Iterator<Item = &str> {
        self.seen.iter().map(String::as_str)
    }

    /// Rebuild a watermark from persisted state.
    pub fn from_parts(
        seen_ids: Vec<String>,
        last_item_id: Option<String>,
        last_run_at: Option<DateTime<Utc>>,
        total_bookmarks: u64,
        mode: Option<String>,
    ) -> Self {
        let mut wm = Self {
            last_item_id,
            last_run_at,
            total_bookmarks,
            mode,
            ..Self::default()
        };
        for id in seen_ids {
            wm.record(&id);
        }
        wm
    }
}

/// The reconciler's view of a tweet already in the graph.
#[derive(Debug, Clone)]
pub struct StoredTweet {
    pub id: String,
    pub text: String,
    pub is_truncated: bool,
    pub has_author: bool,
}

/// Result of merging one item into the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Created,
    Updated,
    Skipped,
}

/// Per-run summary returned to the caller. A run always produces one of
/// these, even under partial failure.
#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncReport {
    pub total_received: u32,
    pub new_stored: u32,
    pub updated: u32,
    pub enriched: u32,
    pub duplicates_skipped: u32,
    pub failed: u32,
}

impl std::fmt::Display for SyncReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Bookmark Sync Complete ===")?;
        writeln!(f, "Received:   {}", self.total_received)?;
        writeln!(f, "New stored: {}", self.new_stored)?;
        writeln!(f, "Updated:    {}", self.updated)?;
        writeln!(f, "Enriched:   {}", self.enriched)?;
        writeln!(f, "Duplicates: {}", self.duplicates_skipped)?;
        writeln!(f, "Failed:     {}", self.failed)
    }
}
