//! End-to-end sync scenarios: scripted feed → enrichment → reconciled store
//! → persisted watermark.

use std::time::Duration;

use tempfile::TempDir;
use tweetgraph_common::{FetchMethod, SyncMode};
use tweetgraph_sync::collector::CollectorConfig;
use tweetgraph_sync::embedder::NoopEmbedder;
use tweetgraph_sync::runner::SyncRunner;
use tweetgraph_sync::state::SyncStateStore;
use tweetgraph_sync::testing::{
    bookmark, full_record, FeedTweet, MockBookmarkStore, MockCaptureDriver, MockEnrichmentSource,
    SourceBehavior,
};
use tweetgraph_sync::traits::EnrichmentSource;

fn config() -> CollectorConfig {
    CollectorConfig {
        bookmarks_url: "https://x.com/i/bookmarks".to_string(),
        settle_delay: Duration::ZERO,
        stagnation_threshold: 2,
    }
}

fn state_in(dir: &TempDir) -> SyncStateStore {
    SyncStateStore::new(dir.path().join("state.json"))
}

fn feed(ids: &[&str]) -> Vec<FeedTweet> {
    ids.iter()
        .map(|id| FeedTweet::new(id, &format!("tweet number {id}.")))
        .collect()
}

/// Text long enough, and unterminated enough, to trip the truncation
/// heuristic.
fn clipped_text() -> String {
    format!("a teaser that got cut {}", "x".repeat(300))
}

#[tokio::test]
async fn empty_watermark_stores_everything_and_grows_seen_ids() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(&dir);
    let driver = MockCaptureDriver::new(vec![
        feed(&["110", "109", "108", "107"]),
        feed(&["110", "109", "108", "107", "106", "105", "104"]),
        feed(&["110", "109", "108", "107", "106", "105", "104", "103", "102", "101"]),
    ]);
    let store = MockBookmarkStore::new();

    let runner = SyncRunner::new(&driver, &store, None, &NoopEmbedder, &state, config());
    let report = runner.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(report.total_received, 10);
    assert_eq!(report.new_stored, 10);
    assert_eq!(report.enriched, 0);
    assert_eq!(report.failed, 0);
    assert_eq!(store.stored_count(), 10);

    let watermark = state.load();
    assert_eq!(watermark.seen_count(), 10);
    assert_eq!(watermark.last_item_id.as_deref(), Some("110"));
    assert_eq!(watermark.mode.as_deref(), Some("incremental"));
}

#[tokio::test]
async fn second_run_converges_and_only_delivers_new_items() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(&dir);
    let store = MockBookmarkStore::new();

    let driver = MockCaptureDriver::new(vec![feed(&["105", "104", "103"])]);
    let runner = SyncRunner::new(&driver, &store, None, &NoopEmbedder, &state, config());
    runner.run(SyncMode::Incremental).await.unwrap();

    // Two new bookmarks arrived above the ones we already have.
    let driver = MockCaptureDriver::new(vec![feed(&["107", "106", "105", "104"])]);
    let runner = SyncRunner::new(&driver, &store, None, &NoopEmbedder, &state, config());
    let report = runner.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(report.total_received, 2);
    assert_eq!(report.new_stored, 2);
    assert_eq!(store.stored_count(), 5);
    assert_eq!(state.load().last_item_id.as_deref(), Some("107"));
}

#[tokio::test]
async fn resubmitting_the_same_feed_skips_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(&dir);
    let store = MockBookmarkStore::new();

    let driver = MockCaptureDriver::new(vec![feed(&["103", "102", "101"])]);
    let runner = SyncRunner::new(&driver, &store, None, &NoopEmbedder, &state, config());
    runner.run(SyncMode::Full).await.unwrap();

    let text_before = store.get("103").unwrap().item.text;

    let driver = MockCaptureDriver::new(vec![feed(&["103", "102", "101"])]);
    let runner = SyncRunner::new(&driver, &store, None, &NoopEmbedder, &state, config());
    let report = runner.run(SyncMode::Full).await.unwrap();

    assert_eq!(report.new_stored, 0);
    assert_eq!(report.duplicates_skipped, 3);
    assert_eq!(store.stored_count(), 3);
    assert_eq!(store.get("103").unwrap().item.text, text_before);
}

#[tokio::test]
async fn full_capture_upgrades_stored_truncated_tweet_without_enrichment() {
    // Scenario: an item was stored truncated; a later capture carries the
    // full text itself. It counts as updated, not enriched.
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(&dir);
    let store = MockBookmarkStore::new().with_stored(bookmark("42", "partial clip", true));

    let driver = MockCaptureDriver::new(vec![vec![FeedTweet::new(
        "42",
        "partial clip, now the complete thought.",
    )]]);
    let runner = SyncRunner::new(&driver, &store, None, &NoopEmbedder, &state, config());
    let report = runner.run(SyncMode::Full).await.unwrap();

    assert_eq!(report.updated, 1);
    assert_eq!(report.enriched, 0);
    assert_eq!(report.new_stored, 0);

    let stored = store.get("42").unwrap();
    assert!(!stored.item.is_truncated);
    assert_eq!(stored.item.text, "partial clip, now the complete thought.");
}

#[tokio::test]
async fn truncated_capture_is_repaired_by_enrichment() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(&dir);
    let store = MockBookmarkStore::new();
    let source = MockEnrichmentSource::new().with_record(full_record(
        "77",
        "a teaser that got cut, and here is the rest of it.",
        Some("alice"),
    ));

    let driver = MockCaptureDriver::new(vec![vec![FeedTweet::new("77", &clipped_text())]]);
    let runner = SyncRunner::new(
        &driver,
        &store,
        Some(&source as &dyn EnrichmentSource),
        &NoopEmbedder,
        &state,
        config(),
    );
    let report = runner.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(report.new_stored, 1);
    assert_eq!(report.enriched, 1);

    let stored = store.get("77").unwrap();
    assert!(!stored.item.is_truncated);
    assert_eq!(stored.item.fetch_method, FetchMethod::Api);
    assert_eq!(stored.item.author_username.as_deref(), Some("alice"));
}

#[tokio::test]
async fn enrichment_auth_failure_still_stores_truncated_items() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(&dir);
    let store = MockBookmarkStore::new();
    let source = MockEnrichmentSource::new().with_behavior(SourceBehavior::AuthFailure);

    let driver = MockCaptureDriver::new(vec![vec![FeedTweet::new("77", &clipped_text())]]);
    let runner = SyncRunner::new(
        &driver,
        &store,
        Some(&source as &dyn EnrichmentSource),
        &NoopEmbedder,
        &state,
        config(),
    );
    let report = runner.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(report.new_stored, 1);
    assert_eq!(report.enriched, 0);
    assert!(store.get("77").unwrap().item.is_truncated);
}

#[tokio::test]
async fn rate_limited_enrichment_keeps_items_truncated_and_run_completes() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(&dir);
    let store = MockBookmarkStore::new();
    let source = MockEnrichmentSource::new().with_behavior(SourceBehavior::RateLimited);

    let driver = MockCaptureDriver::new(vec![vec![FeedTweet::new("77", &clipped_text())]]);
    let runner = SyncRunner::new(
        &driver,
        &store,
        Some(&source as &dyn EnrichmentSource),
        &NoopEmbedder,
        &state,
        config(),
    );
    let report = runner.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(report.new_stored, 1);
    assert_eq!(report.enriched, 0);
    assert!(store.get("77").unwrap().item.is_truncated);
}

#[tokio::test]
async fn store_failure_counts_and_is_not_recorded_as_seen() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(&dir);
    let store = MockBookmarkStore::new().failing_on("102");

    let driver = MockCaptureDriver::new(vec![feed(&["103", "102", "101"])]);
    let runner = SyncRunner::new(&driver, &store, None, &NoopEmbedder, &state, config());
    let report = runner.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(report.new_stored, 2);
    assert_eq!(report.failed, 1);

    // The failed item will be re-discovered next run instead of being
    // treated as delivered.
    let watermark = state.load();
    assert!(watermark.contains("103"));
    assert!(!watermark.contains("102"));
}

#[tokio::test]
async fn no_op_run_still_records_the_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(&dir);
    let store = MockBookmarkStore::new();

    let driver = MockCaptureDriver::new(vec![vec![]]);
    let runner = SyncRunner::new(&driver, &store, None, &NoopEmbedder, &state, config());
    let report = runner.run(SyncMode::Incremental).await.unwrap();

    assert_eq!(report.total_received, 0);
    let watermark = state.load();
    assert!(watermark.last_run_at.is_some());
    assert_eq!(watermark.total_bookmarks, 0);
}

#[tokio::test]
async fn repair_re_enriches_stored_truncated_tweets() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(&dir);
    let store = MockBookmarkStore::new()
        .with_stored(bookmark("1", "clipped one", true))
        .with_stored(bookmark("2", "complete already.", false));
    let source = MockEnrichmentSource::new().with_record(full_record(
        "1",
        "clipped one, restored in full.",
        Some("alice"),
    ));

    let driver = MockCaptureDriver::new(vec![]);
    let runner = SyncRunner::new(
        &driver,
        &store,
        Some(&source as &dyn EnrichmentSource),
        &NoopEmbedder,
        &state,
        config(),
    );
    let report = runner.repair_stored().await.unwrap();

    assert_eq!(report.total_received, 1);
    assert_eq!(report.updated, 1);
    assert_eq!(report.enriched, 1);

    let stored = store.get("1").unwrap();
    assert!(!stored.item.is_truncated);
    assert_eq!(stored.item.text, "clipped one, restored in full.");
    // The untouched tweet stays as it was.
    assert_eq!(store.get("2").unwrap().item.text, "complete already.");
}

#[tokio::test]
async fn repair_without_enrichment_source_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let state = state_in(&dir);
    let store = MockBookmarkStore::new();
    let driver = MockCaptureDriver::new(vec![]);

    let runner = SyncRunner::new(&driver, &store, None, &NoopEmbedder, &state, config());
    assert!(runner.repair_stored().await.is_err());
}
