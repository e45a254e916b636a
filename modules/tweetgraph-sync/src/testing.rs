//! In-memory fakes for the pipeline's seams: a scripted feed driver, an
//! enrichment source with programmable failure modes, and a bookmark store
//! that applies the real reconcile policy to a HashMap.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use browser_relay_client::{CaptureError, ElementHandle};
use chrono::Utc;
use tweetgraph_common::{BookmarkItem, FetchMethod, MergeOutcome, StoredTweet};
use tweetgraph_graph::{reconcile, MergeAction};
use xapi_client::{FullRecord, XApiError};

use crate::parser::{
    LINK_SELECTOR, PERMALINK_SELECTOR, SHOW_MORE_SELECTOR, TEXT_SELECTOR, TWEET_SELECTOR,
    USER_NAME_SELECTOR,
};
use crate::traits::{BookmarkStore, CaptureDriver, EnrichmentSource};

// --- Builders ---

/// A quick [`BookmarkItem`] for tests.
pub fn bookmark(id: &str, text: &str, truncated: bool) -> BookmarkItem {
    BookmarkItem {
        id: id.to_string(),
        text: text.to_string(),
        is_truncated: truncated,
        author_username: Some("someone".to_string()),
        hashtags: BTreeSet::new(),
        mentions: BTreeSet::new(),
        urls: Vec::new(),
        reply_to: None,
        quote_of: None,
        source_url: format!("https://x.com/someone/status/{id}"),
        captured_at: Utc::now(),
        fetch_method: FetchMethod::Browser,
    }
}

/// A quick [`FullRecord`] for tests.
pub fn full_record(id: &str, text: &str, author: Option<&str>) -> FullRecord {
    FullRecord {
        id: id.to_string(),
        text: text.to_string(),
        author_username: author.map(String::from),
        hashtags: Vec::new(),
        mentions: Vec::new(),
        urls: Vec::new(),
        reply_to: None,
        quote_of: None,
        created_at: None,
    }
}

// --- Mock capture driver ---

/// One tweet as the fake feed renders it.
#[derive(Debug, Clone)]
pub struct FeedTweet {
    pub id: String,
    /// Empty text renders no text element (an unparsable card).
    pub text: String,
    pub author: Option<String>,
    /// External anchor hrefs on the card.
    pub links: Vec<String>,
    pub show_more: Option<ShowMore>,
}

#[derive(Debug, Clone)]
pub struct ShowMore {
    pub expanded_text: String,
    pub click_succeeds: bool,
}

impl FeedTweet {
    pub fn new(id: &str, text: &str) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            author: Some("someone".to_string()),
            links: Vec::new(),
            show_more: None,
        }
    }
}

#[derive(Default)]
struct DriverState {
    passes: VecDeque<Vec<FeedTweet>>,
    current: Vec<FeedTweet>,
    expanded: HashSet<String>,
    pass_count: u32,
}

/// Capture driver over a scripted sequence of passes. Each
/// `query_all(tweet)` call serves the next scripted pass; once the script is
/// exhausted the last pass repeats, like a feed that stopped growing.
pub struct MockCaptureDriver {
    state: Mutex<DriverState>,
    pub fail_navigate: bool,
    pub feed_renders: bool,
    pub fail_query_on_pass: Option<u32>,
    pub fail_scroll: bool,
}

impl MockCaptureDriver {
    pub fn new(passes: Vec<Vec<FeedTweet>>) -> Self {
        Self {
            state: Mutex::new(DriverState {
                passes: passes.into(),
                ..Default::default()
            }),
            fail_navigate: false,
            feed_renders: true,
            fail_query_on_pass: None,
            fail_scroll: false,
        }
    }

    pub fn passes_served(&self) -> u32 {
        self.state.lock().unwrap().pass_count
    }

    fn tweet_at(&self, handle: &str) -> Option<FeedTweet> {
        let state = self.state.lock().unwrap();
        let index: usize = handle.strip_prefix('t')?.split('/').next()?.parse().ok()?;
        state.current.get(index).cloned()
    }

    fn injected(message: &str) -> CaptureError {
        CaptureError::Network(message.to_string())
    }
}

#[async_trait]
impl CaptureDriver for MockCaptureDriver {
    async fn navigate(&self, _url: &str) -> Result<(), CaptureError> {
        if self.fail_navigate {
            return Err(Self::injected("navigation refused"));
        }
        Ok(())
    }

    async fn wait_for_element(
        &self,
        _selector: &str,
        _timeout_ms: u64,
    ) -> Result<bool, CaptureError> {
        Ok(self.feed_renders)
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, CaptureError> {
        assert_eq!(selector, TWEET_SELECTOR, "page-wide queries are tweet cards");
        let mut state = self.state.lock().unwrap();
        state.pass_count += 1;
        if self.fail_query_on_pass == Some(state.pass_count) {
            return Err(Self::injected("capture channel dropped"));
        }
        if let Some(next) = state.passes.pop_front() {
            state.current = next;
        }
        Ok((0..state.current.len()).map(|i| format!("t{i}")).collect())
    }

    async fn query_within(
        &self,
        root: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, CaptureError> {
        let Some(tweet) = self.tweet_at(root) else {
            return Ok(Vec::new());
        };

        let handles = match selector {
            PERMALINK_SELECTOR => vec![format!("{root}/link")],
            TEXT_SELECTOR if !tweet.text.is_empty() => vec![format!("{root}/text")],
            USER_NAME_SELECTOR if tweet.author.is_some() => vec![format!("{root}/user")],
            SHOW_MORE_SELECTOR if tweet.show_more.is_some() => vec![format!("{root}/more")],
            LINK_SELECTOR => (0..tweet.links.len()).map(|j| format!("{root}/url{j}")).collect(),
            _ => Vec::new(),
        };
        Ok(handles)
    }

    async fn get_text(&self, handle: &ElementHandle) -> Result<String, CaptureError> {
        let Some(tweet) = self.tweet_at(handle) else {
            return Err(Self::injected("stale handle"));
        };

        if handle.ends_with("/text") {
            let expanded = self.state.lock().unwrap().expanded.contains(&tweet.id);
            if expanded {
                if let Some(more) = &tweet.show_more {
                    return Ok(more.expanded_text.clone());
                }
            }
            return Ok(tweet.text);
        }
        if handle.ends_with("/user") {
            let author = tweet.author.unwrap_or_default();
            return Ok(format!("Someone\n@{author}\n·\n2h"));
        }
        Err(Self::injected("unknown text target"))
    }

    async fn get_attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, CaptureError> {
        if name != "href" {
            return Ok(None);
        }
        let Some(tweet) = self.tweet_at(handle) else {
            return Ok(None);
        };

        if handle.ends_with("/link") {
            let author = tweet.author.as_deref().unwrap_or("i");
            return Ok(Some(format!("/{author}/status/{}", tweet.id)));
        }
        if let Some(j) = handle.rsplit_once("/url").and_then(|(_, j)| j.parse::<usize>().ok()) {
            return Ok(tweet.links.get(j).cloned());
        }
        Ok(None)
    }

    async fn scroll_by(&self, _pixels: i64) -> Result<(), CaptureError> {
        if self.fail_scroll {
            return Err(Self::injected("scroll refused"));
        }
        Ok(())
    }

    async fn click(&self, handle: &ElementHandle, _timeout_ms: u64) -> Result<bool, CaptureError> {
        let Some(tweet) = self.tweet_at(handle) else {
            return Ok(false);
        };
        if handle.ends_with("/more") {
            if let Some(more) = &tweet.show_more {
                if more.click_succeeds {
                    self.state.lock().unwrap().expanded.insert(tweet.id.clone());
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

// --- Mock enrichment source ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceBehavior {
    Succeed,
    RateLimited,
    AuthFailure,
    ServerError,
    /// First batch succeeds, every later batch is rate limited.
    RateLimitedAfterFirst,
}

pub struct MockEnrichmentSource {
    records: HashMap<String, FullRecord>,
    behavior: SourceBehavior,
    calls: Mutex<Vec<usize>>,
}

impl MockEnrichmentSource {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
            behavior: SourceBehavior::Succeed,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_record(mut self, record: FullRecord) -> Self {
        self.records.insert(record.id.clone(), record);
        self
    }

    pub fn with_behavior(mut self, behavior: SourceBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Sizes of the batches received, in call order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockEnrichmentSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EnrichmentSource for MockEnrichmentSource {
    async fn fetch_batch(&self, ids: &[String]) -> Result<HashMap<String, FullRecord>, XApiError> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(ids.len());
            calls.len()
        };

        let succeed = match self.behavior {
            SourceBehavior::Succeed => true,
            SourceBehavior::RateLimitedAfterFirst => call_number == 1,
            SourceBehavior::RateLimited => {
                return Err(XApiError::RateLimited { reset_at: None });
            }
            SourceBehavior::AuthFailure => {
                return Err(XApiError::Auth("invalid token".to_string()));
            }
            SourceBehavior::ServerError => {
                return Err(XApiError::Api {
                    status: 500,
                    message: "internal error".to_string(),
                });
            }
        };
        if !succeed {
            return Err(XApiError::RateLimited { reset_at: None });
        }

        Ok(ids
            .iter()
            .filter_map(|id| self.records.get(id).map(|r| (id.clone(), r.clone())))
            .collect())
    }
}

// --- Mock bookmark store ---

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub item: BookmarkItem,
    pub themes: BTreeSet<String>,
    pub entities: BTreeSet<String>,
    /// Merge calls that touched this id, including skips.
    pub merges: u32,
}

/// Bookmark store over a HashMap, applying the same [`reconcile`] policy as
/// the graph writer.
#[derive(Default)]
pub struct MockBookmarkStore {
    tweets: Mutex<HashMap<String, StoredRecord>>,
    fail_ids: HashSet<String>,
}

impl MockBookmarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Preload a stored tweet.
    pub fn with_stored(self, item: BookmarkItem) -> Self {
        self.tweets.lock().unwrap().insert(
            item.id.clone(),
            StoredRecord {
                item,
                themes: BTreeSet::new(),
                entities: BTreeSet::new(),
                merges: 0,
            },
        );
        self
    }

    /// Make merges of one id fail, to exercise per-item failure counting.
    pub fn failing_on(mut self, id: &str) -> Self {
        self.fail_ids.insert(id.to_string());
        self
    }

    pub fn get(&self, id: &str) -> Option<StoredRecord> {
        self.tweets.lock().unwrap().get(id).cloned()
    }

    pub fn stored_count(&self) -> usize {
        self.tweets.lock().unwrap().len()
    }
}

#[async_trait]
impl BookmarkStore for MockBookmarkStore {
    async fn merge_item(
        &self,
        item: &BookmarkItem,
        themes: &BTreeSet<String>,
        entities: &BTreeSet<String>,
        _embedding: Option<Vec<f32>>,
    ) -> anyhow::Result<MergeOutcome> {
        if self.fail_ids.contains(&item.id) {
            anyhow::bail!("injected store failure");
        }

        let mut tweets = self.tweets.lock().unwrap();
        let existing = tweets.get(&item.id).map(|record| StoredTweet {
            id: record.item.id.clone(),
            text: record.item.text.clone(),
            is_truncated: record.item.is_truncated,
            has_author: record
                .item
                .author_username
                .as_deref()
                .is_some_and(|a| !a.trim().is_empty()),
        });

        match reconcile(existing.as_ref(), item) {
            MergeAction::Create => {
                tweets.insert(
                    item.id.clone(),
                    StoredRecord {
                        item: item.clone(),
                        themes: themes.clone(),
                        entities: entities.clone(),
                        merges: 1,
                    },
                );
                Ok(MergeOutcome::Created)
            }
            MergeAction::OverwriteText => {
                let record = tweets.get_mut(&item.id).expect("overwrite implies existing");
                record.item.text = item.text.clone();
                record.item.is_truncated = false;
                record.item.fetch_method = item.fetch_method;
                record.item.hashtags = item.hashtags.clone();
                record.item.mentions = item.mentions.clone();
                if item.author_username.is_some() {
                    record.item.author_username = item.author_username.clone();
                }
                // Edge merges accumulate, like MERGE in the graph.
                record.themes.extend(themes.iter().cloned());
                record.entities.extend(entities.iter().cloned());
                record.merges += 1;
                Ok(MergeOutcome::Updated)
            }
            MergeAction::BackfillAuthor => {
                let record = tweets.get_mut(&item.id).expect("backfill implies existing");
                record.item.author_username = item.author_username.clone();
                record.merges += 1;
                Ok(MergeOutcome::Updated)
            }
            MergeAction::Skip => {
                let record = tweets.get_mut(&item.id).expect("skip implies existing");
                record.merges += 1;
                Ok(MergeOutcome::Skipped)
            }
        }
    }

    async fn truncated_ids(&self) -> anyhow::Result<Vec<String>> {
        Ok(self
            .tweets
            .lock()
            .unwrap()
            .values()
            .filter(|record| record.item.is_truncated)
            .map(|record| record.item.id.clone())
            .collect())
    }
}
