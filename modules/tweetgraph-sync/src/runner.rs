//! Sync runner: one run end to end (collect, enrich, merge, persist).
//!
//! Single logical thread of control: every suspension point (capture calls,
//! enrichment HTTP, graph writes, the settle delay) is awaited to completion
//! before the next step.

use std::collections::HashSet;

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info, warn};
use tweetgraph_common::themes::derive_themes_and_entities;
use tweetgraph_common::{BookmarkItem, MergeOutcome, SyncMode, SyncReport, TweetGraphError};
use xapi_client::{FullRecord, XApiError, BATCH_LIMIT};

use crate::collector::{Collector, CollectorConfig};
use crate::embedder::TextEmbedder;
use crate::enrich::{apply_full_record, EnrichmentResolver};
use crate::state::SyncStateStore;
use crate::traits::{BookmarkStore, CaptureDriver, EnrichmentSource};

pub struct SyncRunner<'a> {
    driver: &'a dyn CaptureDriver,
    store: &'a dyn BookmarkStore,
    enrichment: Option<&'a dyn EnrichmentSource>,
    embedder: &'a dyn TextEmbedder,
    state: &'a SyncStateStore,
    collector_config: CollectorConfig,
}

impl<'a> SyncRunner<'a> {
    pub fn new(
        driver: &'a dyn CaptureDriver,
        store: &'a dyn BookmarkStore,
        enrichment: Option<&'a dyn EnrichmentSource>,
        embedder: &'a dyn TextEmbedder,
        state: &'a SyncStateStore,
        collector_config: CollectorConfig,
    ) -> Self {
        Self {
            driver,
            store,
            enrichment,
            embedder,
            state,
            collector_config,
        }
    }

    /// Run one sync. Always ends with a summary; per-item problems are
    /// counted, not raised. Only a capture failure before anything was
    /// accumulated surfaces as an error (and leaves the watermark untouched).
    pub async fn run(&self, mode: SyncMode) -> Result<SyncReport> {
        let mut watermark = self.state.load();
        info!(
            mode = mode.as_str(),
            seen = watermark.seen_count(),
            "Starting bookmark sync"
        );

        let collector = Collector::new(self.driver, self.collector_config.clone());
        let collection = collector.collect(mode, &watermark).await?;
        let mut items = collection.items;

        let mut report = SyncReport {
            total_received: items.len() as u32,
            ..Default::default()
        };

        let repaired = self.enrich_phase(&mut items).await;

        for item in &items {
            match self.merge_one(item).await {
                Ok(outcome) => {
                    tally(&mut report, outcome, repaired.contains(&item.id));
                    watermark.record(&item.id);
                }
                Err(e) => {
                    warn!(id = item.id.as_str(), error = %e, "Store failed for item");
                    report.failed += 1;
                }
            }
        }

        if let Some(first) = items.first() {
            watermark.last_item_id = Some(first.id.clone());
        }
        watermark.last_run_at = Some(Utc::now());
        watermark.total_bookmarks = report.total_received as u64;
        watermark.mode = Some(mode.as_str().to_string());
        self.state.save(&watermark)?;

        info!("Sync run complete. {report}");
        Ok(report)
    }

    /// Re-enrich tweets already stored with truncated text, without touching
    /// the feed. Backs the `--repair` flag.
    pub async fn repair_stored(&self) -> Result<SyncReport> {
        let Some(source) = self.enrichment else {
            anyhow::bail!("repair requires an enrichment source (X_BEARER_TOKEN)");
        };

        let ids = self.store.truncated_ids().await?;
        let mut report = SyncReport {
            total_received: ids.len() as u32,
            ..Default::default()
        };
        if ids.is_empty() {
            info!("No truncated tweets to repair");
            return Ok(report);
        }
        info!(count = ids.len(), "Repairing stored truncated tweets");

        for chunk in ids.chunks(BATCH_LIMIT) {
            let records = match source.fetch_batch(chunk).await {
                Ok(records) => records,
                Err(XApiError::RateLimited { reset_at }) => {
                    warn!(?reset_at, "Rate limited, stopping repair");
                    break;
                }
                Err(XApiError::Auth(message)) => {
                    return Err(TweetGraphError::EnrichmentAuth(message).into());
                }
                Err(e) => {
                    warn!(error = %e, "Repair batch failed, stopping");
                    break;
                }
            };

            for record in records.into_values() {
                let item = item_from_record(record);
                match self.merge_one(&item).await {
                    Ok(outcome) => tally(&mut report, outcome, true),
                    Err(e) => {
                        warn!(id = item.id.as_str(), error = %e, "Repair merge failed");
                        report.failed += 1;
                    }
                }
            }
        }

        info!("Repair complete. {report}");
        Ok(report)
    }

    /// Repair truncated items before merging. Auth failure kills enrichment
    /// for this run but never the sync itself.
    async fn enrich_phase(&self, items: &mut [BookmarkItem]) -> HashSet<String> {
        let Some(source) = self.enrichment else {
            return HashSet::new();
        };
        if !items.iter().any(|item| item.is_truncated) {
            return HashSet::new();
        }

        match EnrichmentResolver::new(source).repair(items).await {
            Ok(summary) => summary.repaired,
            Err(TweetGraphError::EnrichmentAuth(message)) => {
                error!(
                    error = message.as_str(),
                    "Enrichment authentication failed; continuing without enrichment"
                );
                HashSet::new()
            }
            Err(e) => {
                warn!(error = %e, "Enrichment failed; continuing without it");
                HashSet::new()
            }
        }
    }

    /// Derive semantics from the item's final text, embed best-effort, merge.
    async fn merge_one(&self, item: &BookmarkItem) -> Result<MergeOutcome> {
        let (themes, entities) = derive_themes_and_entities(&item.text);

        let embedding = match self.embedder.embed(&item.text).await {
            Ok(vector) if !vector.is_empty() => Some(vector),
            Ok(_) => None,
            Err(e) => {
                warn!(id = item.id.as_str(), error = %e, "Embedding failed, storing without vector");
                None
            }
        };

        self.store.merge_item(item, &themes, &entities, embedding).await
    }
}

fn tally(report: &mut SyncReport, outcome: MergeOutcome, enriched: bool) {
    match outcome {
        MergeOutcome::Created => {
            report.new_stored += 1;
            if enriched {
                report.enriched += 1;
            }
        }
        MergeOutcome::Updated => {
            report.updated += 1;
            if enriched {
                report.enriched += 1;
            }
        }
        MergeOutcome::Skipped => report.duplicates_skipped += 1,
    }
}

/// Build a mergeable item from an enrichment record (repair path, where
/// there was no browser capture).
fn item_from_record(record: FullRecord) -> BookmarkItem {
    let source_url = match record.author_username.as_deref() {
        Some(author) => format!("https://x.com/{author}/status/{}", record.id),
        None => format!("https://x.com/i/status/{}", record.id),
    };

    let mut item = BookmarkItem {
        id: record.id.clone(),
        text: String::new(),
        is_truncated: true,
        author_username: None,
        hashtags: Default::default(),
        mentions: Default::default(),
        urls: Vec::new(),
        reply_to: None,
        quote_of: None,
        source_url,
        captured_at: Utc::now(),
        fetch_method: Default::default(),
    };
    apply_full_record(&mut item, &record);
    item
}
