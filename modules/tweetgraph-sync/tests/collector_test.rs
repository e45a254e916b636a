//! Collector state-machine tests over a scripted feed.

use std::time::Duration;

use tweetgraph_common::{SyncMode, SyncWatermark, TweetGraphError};
use tweetgraph_sync::collector::{Collector, CollectorConfig};
use tweetgraph_sync::testing::{FeedTweet, MockCaptureDriver};

fn config() -> CollectorConfig {
    CollectorConfig {
        bookmarks_url: "https://x.com/i/bookmarks".to_string(),
        settle_delay: Duration::ZERO,
        stagnation_threshold: 2,
    }
}

fn feed(ids: &[&str]) -> Vec<FeedTweet> {
    ids.iter()
        .map(|id| FeedTweet::new(id, &format!("tweet number {id}.")))
        .collect()
}

#[tokio::test]
async fn ten_unique_items_across_three_passes() {
    // The feed grows cumulatively under scroll, with earlier rows re-served.
    let driver = MockCaptureDriver::new(vec![
        feed(&["110", "109", "108", "107"]),
        feed(&["110", "109", "108", "107", "106", "105", "104"]),
        feed(&["110", "109", "108", "107", "106", "105", "104", "103", "102", "101"]),
    ]);
    let collector = Collector::new(&driver, config());

    let collection = collector
        .collect(SyncMode::Full, &SyncWatermark::default())
        .await
        .unwrap();

    let ids: Vec<&str> = collection.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(
        ids,
        vec!["110", "109", "108", "107", "106", "105", "104", "103", "102", "101"]
    );
    assert!(!collection.converged);
}

#[tokio::test]
async fn incremental_mode_converges_on_known_id() {
    let mut watermark = SyncWatermark::default();
    watermark.record("100");

    let driver = MockCaptureDriver::new(vec![feed(&["105", "104", "103", "100", "99"])]);
    let collector = Collector::new(&driver, config());

    let collection = collector
        .collect(SyncMode::Incremental, &watermark)
        .await
        .unwrap();

    let ids: Vec<&str> = collection.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["105", "104", "103"]);
    assert!(collection.converged);
    assert_eq!(collection.passes, 1);
}

#[tokio::test]
async fn full_mode_ignores_the_watermark() {
    let mut watermark = SyncWatermark::default();
    watermark.record("100");

    let driver = MockCaptureDriver::new(vec![feed(&["105", "100", "99"])]);
    let collector = Collector::new(&driver, config());

    let collection = collector.collect(SyncMode::Full, &watermark).await.unwrap();
    assert_eq!(collection.items.len(), 3);
    assert!(!collection.converged);
}

#[tokio::test]
async fn stagnant_feed_stops_after_threshold() {
    let driver = MockCaptureDriver::new(vec![feed(&["103", "102", "101"])]);
    let collector = Collector::new(&driver, config());

    let collection = collector
        .collect(SyncMode::Full, &SyncWatermark::default())
        .await
        .unwrap();

    assert_eq!(collection.items.len(), 3);
    // One growing pass, then two unchanged passes hit the threshold of 2.
    assert_eq!(collection.passes, 3);
}

#[tokio::test]
async fn navigation_failure_is_fatal() {
    let mut driver = MockCaptureDriver::new(vec![feed(&["101"])]);
    driver.fail_navigate = true;
    let collector = Collector::new(&driver, config());

    let err = collector
        .collect(SyncMode::Full, &SyncWatermark::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TweetGraphError::Capture(_)));
}

#[tokio::test]
async fn feed_never_rendering_is_fatal() {
    let mut driver = MockCaptureDriver::new(vec![feed(&["101"])]);
    driver.feed_renders = false;
    let collector = Collector::new(&driver, config());

    let err = collector
        .collect(SyncMode::Full, &SyncWatermark::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TweetGraphError::Capture(_)));
}

#[tokio::test]
async fn first_pass_capture_failure_is_fatal() {
    let mut driver = MockCaptureDriver::new(vec![feed(&["101"])]);
    driver.fail_query_on_pass = Some(1);
    let collector = Collector::new(&driver, config());

    let err = collector
        .collect(SyncMode::Full, &SyncWatermark::default())
        .await
        .unwrap_err();
    assert!(matches!(err, TweetGraphError::Capture(_)));
}

#[tokio::test]
async fn later_pass_failure_keeps_partial_results() {
    let mut driver = MockCaptureDriver::new(vec![
        feed(&["103", "102", "101"]),
        feed(&["103", "102", "101", "100"]),
    ]);
    driver.fail_query_on_pass = Some(2);
    let collector = Collector::new(&driver, config());

    let collection = collector
        .collect(SyncMode::Full, &SyncWatermark::default())
        .await
        .unwrap();

    assert_eq!(collection.items.len(), 3);
}

#[tokio::test]
async fn scroll_failure_keeps_partial_results() {
    let mut driver = MockCaptureDriver::new(vec![feed(&["103", "102"])]);
    driver.fail_scroll = true;
    let collector = Collector::new(&driver, config());

    let collection = collector
        .collect(SyncMode::Full, &SyncWatermark::default())
        .await
        .unwrap();

    assert_eq!(collection.items.len(), 2);
    assert_eq!(collection.passes, 1);
}

#[tokio::test]
async fn unparsable_cards_are_dropped_silently() {
    let mut cards = feed(&["102"]);
    cards.push(FeedTweet::new("101", "")); // no text element
    let driver = MockCaptureDriver::new(vec![cards]);
    let collector = Collector::new(&driver, config());

    let collection = collector
        .collect(SyncMode::Full, &SyncWatermark::default())
        .await
        .unwrap();

    assert_eq!(collection.items.len(), 1);
    assert_eq!(collection.items[0].id, "102");
}

#[tokio::test]
async fn duplicate_ids_within_a_pass_are_collapsed() {
    let driver = MockCaptureDriver::new(vec![feed(&["101", "101", "101"])]);
    let collector = Collector::new(&driver, config());

    let collection = collector
        .collect(SyncMode::Full, &SyncWatermark::default())
        .await
        .unwrap();

    assert_eq!(collection.items.len(), 1);
}
