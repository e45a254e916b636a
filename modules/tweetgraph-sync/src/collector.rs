//! Incremental collector: drives the capture session through repeated
//! scroll/capture passes, accumulating newly-seen items until the feed
//! converges, stagnates, or hits the pass cap.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{info, warn};
use tweetgraph_common::{BookmarkItem, SyncMode, SyncWatermark, TweetGraphError};

use crate::parser::{parse_item, TWEET_SELECTOR};
use crate::traits::CaptureDriver;

/// How long the first render of the feed may take before the run is fatal.
pub const FEED_RENDER_TIMEOUT_MS: u64 = 30_000;

const SCROLL_STEP_PX: i64 = 2000;

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub bookmarks_url: String,
    /// Fixed delay after each scroll for lazy-loaded rows to settle.
    pub settle_delay: Duration,
    /// Consecutive passes without growth before giving up.
    pub stagnation_threshold: u32,
}

/// What one collection run produced.
#[derive(Debug, Default)]
pub struct Collection {
    /// First-seen order. No duplicate ids.
    pub items: Vec<BookmarkItem>,
    /// Whether a previously-seen id ended the run (incremental mode only).
    pub converged: bool,
    pub passes: u32,
}

pub struct Collector<'a> {
    driver: &'a dyn CaptureDriver,
    config: CollectorConfig,
}

impl<'a> Collector<'a> {
    pub fn new(driver: &'a dyn CaptureDriver, config: CollectorConfig) -> Self {
        Self { driver, config }
    }

    /// Collect newly-discovered items. The watermark is read-only here; the
    /// runner records delivered ids after storage succeeds.
    ///
    /// Capture failures before anything was accumulated are fatal. Once the
    /// first pass has produced items, later failures soft-stop the run and
    /// the accumulator is returned as-is: a half-finished sync beats a lost
    /// one, since merging is idempotent.
    pub async fn collect(
        &self,
        mode: SyncMode,
        watermark: &SyncWatermark,
    ) -> Result<Collection, TweetGraphError> {
        self.driver
            .navigate(&self.config.bookmarks_url)
            .await
            .map_err(|e| TweetGraphError::Capture(format!("navigation failed: {e}")))?;

        let rendered = self
            .driver
            .wait_for_element(TWEET_SELECTOR, FEED_RENDER_TIMEOUT_MS)
            .await
            .map_err(|e| TweetGraphError::Capture(format!("wait for feed failed: {e}")))?;
        if !rendered {
            return Err(TweetGraphError::Capture(
                "bookmark feed never rendered".to_string(),
            ));
        }

        let mut collection = Collection::default();
        let mut seen_in_run: HashSet<String> = HashSet::new();
        let mut stagnant_passes = 0u32;

        while collection.passes < mode.max_passes() {
            collection.passes += 1;

            let handles = match self.driver.query_all(TWEET_SELECTOR).await {
                Ok(handles) => handles,
                Err(e) if collection.passes == 1 => {
                    return Err(TweetGraphError::Capture(format!(
                        "first capture pass failed: {e}"
                    )));
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        pass = collection.passes,
                        items = collection.items.len(),
                        "Capture failed mid-run, keeping partial results"
                    );
                    break;
                }
            };

            let before = collection.items.len();
            for handle in &handles {
                let Some(item) = parse_item(self.driver, handle).await else {
                    continue;
                };
                if seen_in_run.contains(&item.id) {
                    continue;
                }
                // The feed is newest-first: hitting a known id means
                // everything after it was already delivered in a past run.
                if mode == SyncMode::Incremental && watermark.contains(&item.id) {
                    info!(
                        id = item.id.as_str(),
                        pass = collection.passes,
                        "Reached previously-seen item, converging"
                    );
                    collection.converged = true;
                    break;
                }
                seen_in_run.insert(item.id.clone());
                collection.items.push(item);
            }

            if collection.converged {
                break;
            }

            if collection.items.len() == before {
                stagnant_passes += 1;
                if stagnant_passes >= self.config.stagnation_threshold {
                    info!(
                        passes = collection.passes,
                        items = collection.items.len(),
                        "Feed stagnant, stopping"
                    );
                    break;
                }
            } else {
                stagnant_passes = 0;
            }

            if let Err(e) = self.driver.scroll_by(SCROLL_STEP_PX).await {
                warn!(error = %e, "Scroll failed, keeping partial results");
                break;
            }
            tokio::time::sleep(self.config.settle_delay).await;
        }

        info!(
            items = collection.items.len(),
            passes = collection.passes,
            converged = collection.converged,
            mode = mode.as_str(),
            "Collection finished"
        );
        Ok(collection)
    }
}
