//! Seams between the pipeline and its external collaborators. Each trait has
//! one production implementation and an in-memory mock for tests.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use browser_relay_client::{CaptureError, ElementHandle};
use tweetgraph_common::{BookmarkItem, MergeOutcome};
use xapi_client::{FullRecord, XApiError};

/// Control channel to the browser session rendering the bookmark feed.
#[async_trait]
pub trait CaptureDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), CaptureError>;
    async fn wait_for_element(&self, selector: &str, timeout_ms: u64)
        -> Result<bool, CaptureError>;
    /// All elements currently matching `selector`, page-wide.
    async fn query_all(&self, selector: &str) -> Result<Vec<ElementHandle>, CaptureError>;
    /// Matching descendants of one element.
    async fn query_within(
        &self,
        root: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, CaptureError>;
    async fn get_text(&self, handle: &ElementHandle) -> Result<String, CaptureError>;
    async fn get_attribute(
        &self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, CaptureError>;
    async fn scroll_by(&self, pixels: i64) -> Result<(), CaptureError>;
    /// Returns whether the click landed within the timeout.
    async fn click(&self, handle: &ElementHandle, timeout_ms: u64) -> Result<bool, CaptureError>;
}

/// Secondary source for full tweet content. Ids the source does not
/// recognize are absent from the result, not an error.
#[async_trait]
pub trait EnrichmentSource: Send + Sync {
    async fn fetch_batch(&self, ids: &[String]) -> Result<HashMap<String, FullRecord>, XApiError>;
}

#[async_trait]
impl EnrichmentSource for xapi_client::XApiClient {
    async fn fetch_batch(&self, ids: &[String]) -> Result<HashMap<String, FullRecord>, XApiError> {
        self.get_tweets_batch(ids).await
    }
}

/// Persistent store for tweets and their derived relationships.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    /// Idempotent merge of one item. Themes/entities are derived from the
    /// item's current text by the caller; the embedding is optional.
    async fn merge_item(
        &self,
        item: &BookmarkItem,
        themes: &BTreeSet<String>,
        entities: &BTreeSet<String>,
        embedding: Option<Vec<f32>>,
    ) -> anyhow::Result<MergeOutcome>;

    /// Ids of stored tweets still flagged truncated, for the repair pass.
    async fn truncated_ids(&self) -> anyhow::Result<Vec<String>>;
}

#[async_trait]
impl BookmarkStore for tweetgraph_graph::GraphWriter {
    async fn merge_item(
        &self,
        item: &BookmarkItem,
        themes: &BTreeSet<String>,
        entities: &BTreeSet<String>,
        embedding: Option<Vec<f32>>,
    ) -> anyhow::Result<MergeOutcome> {
        self.merge_item(item, themes, entities, embedding.as_deref())
            .await
            .map_err(|e| anyhow::anyhow!("graph merge failed: {e}"))
    }

    async fn truncated_ids(&self) -> anyhow::Result<Vec<String>> {
        self.get_truncated_ids()
            .await
            .map_err(|e| anyhow::anyhow!("truncated-id query failed: {e}"))
    }
}
