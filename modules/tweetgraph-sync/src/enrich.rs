//! Enrichment resolver: repairs truncated items from the secondary source.

use std::collections::{HashMap, HashSet};

use tracing::{info, warn};
use tweetgraph_common::extract::{extract_hashtags, extract_mentions, strip_query};
use tweetgraph_common::{BookmarkItem, FetchMethod, TweetGraphError, MAX_URLS_PER_ITEM};
use xapi_client::{FullRecord, XApiError, BATCH_LIMIT};

use crate::traits::EnrichmentSource;

#[derive(Debug, Default)]
pub struct EnrichmentSummary {
    /// Ids sent to the source.
    pub attempted: u32,
    /// Ids whose text was repaired.
    pub repaired: HashSet<String>,
    /// Whether the phase stopped early on a rate limit.
    pub rate_limited: bool,
}

pub struct EnrichmentResolver<'a> {
    source: &'a dyn EnrichmentSource,
}

impl<'a> EnrichmentResolver<'a> {
    pub fn new(source: &'a dyn EnrichmentSource) -> Self {
        Self { source }
    }

    /// Repair truncated items in place.
    ///
    /// Ids the source does not recognize stay truncated. A rate limit stops
    /// the phase for this run (remaining items stay truncated rather than
    /// retry-looping); an authentication failure is fatal to the phase and
    /// propagates so the caller can continue the sync without enrichment.
    pub async fn repair(
        &self,
        items: &mut [BookmarkItem],
    ) -> Result<EnrichmentSummary, TweetGraphError> {
        let truncated_ids: Vec<String> = items
            .iter()
            .filter(|item| item.is_truncated)
            .map(|item| item.id.clone())
            .collect();

        let mut summary = EnrichmentSummary::default();
        if truncated_ids.is_empty() {
            return Ok(summary);
        }
        info!(count = truncated_ids.len(), "Fetching full text for truncated items");

        let mut records: HashMap<String, FullRecord> = HashMap::new();
        for chunk in truncated_ids.chunks(BATCH_LIMIT) {
            summary.attempted += chunk.len() as u32;
            match self.source.fetch_batch(chunk).await {
                Ok(batch) => records.extend(batch),
                Err(XApiError::RateLimited { reset_at }) => {
                    warn!(?reset_at, "Enrichment rate limited, remaining items stay truncated");
                    summary.rate_limited = true;
                    break;
                }
                Err(XApiError::Auth(message)) => {
                    return Err(TweetGraphError::EnrichmentAuth(message));
                }
                Err(e) => {
                    warn!(error = %e, "Enrichment batch failed, remaining items stay truncated");
                    break;
                }
            }
        }

        for item in items.iter_mut() {
            if !item.is_truncated {
                continue;
            }
            if let Some(record) = records.get(&item.id) {
                apply_full_record(item, record);
                summary.repaired.insert(item.id.clone());
            }
        }

        info!(
            repaired = summary.repaired.len(),
            attempted = summary.attempted,
            "Enrichment complete"
        );
        Ok(summary)
    }
}

/// Overwrite an item with the authoritative full record. The API's entity
/// lists win when present; otherwise entities are re-extracted from the new
/// text.
pub(crate) fn apply_full_record(item: &mut BookmarkItem, record: &FullRecord) {
    item.text = record.text.clone();
    item.is_truncated = false;
    item.fetch_method = FetchMethod::Api;

    if record.author_username.is_some() {
        item.author_username = record.author_username.clone();
    }

    item.hashtags = if record.hashtags.is_empty() {
        extract_hashtags(&item.text)
    } else {
        record.hashtags.iter().cloned().collect()
    };
    item.mentions = if record.mentions.is_empty() {
        extract_mentions(&item.text)
    } else {
        record.mentions.iter().cloned().collect()
    };

    if !record.urls.is_empty() {
        let mut urls = Vec::new();
        let mut seen = HashSet::new();
        for url in &record.urls {
            let clean = strip_query(url);
            if seen.insert(clean.clone()) {
                urls.push(clean);
                if urls.len() >= MAX_URLS_PER_ITEM {
                    break;
                }
            }
        }
        item.urls = urls;
    }

    if item.reply_to.is_none() {
        item.reply_to = record.reply_to.clone();
    }
    if item.quote_of.is_none() {
        item.quote_of = record.quote_of.clone();
    }
}
