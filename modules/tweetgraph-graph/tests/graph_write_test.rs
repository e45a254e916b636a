//! Integration tests for idempotent tweet merging against a live Neo4j.
//!
//! Run with: cargo test -p tweetgraph-graph --test graph_write_test -- --ignored
//! Requires NEO4J_URI / NEO4J_USER / NEO4J_PASSWORD pointing at a throwaway
//! database.

use std::collections::BTreeSet;

use chrono::Utc;
use tweetgraph_common::{BookmarkItem, FetchMethod, MergeOutcome};
use tweetgraph_graph::{migrate, query, GraphClient, GraphWriter};

async fn connect() -> GraphClient {
    let uri = std::env::var("NEO4J_URI").expect("NEO4J_URI required");
    let user = std::env::var("NEO4J_USER").expect("NEO4J_USER required");
    let password = std::env::var("NEO4J_PASSWORD").expect("NEO4J_PASSWORD required");

    let client = GraphClient::connect(&uri, &user, &password)
        .await
        .expect("Failed to connect");
    migrate::migrate(&client, 1536).await.expect("migrate");
    client
}

fn item(id: &str, text: &str, truncated: bool) -> BookmarkItem {
    BookmarkItem {
        id: id.to_string(),
        text: text.to_string(),
        is_truncated: truncated,
        author_username: Some("testauthor".to_string()),
        hashtags: ["Rust".to_string()].into_iter().collect(),
        mentions: BTreeSet::new(),
        urls: vec!["https://example.com/post".to_string()],
        reply_to: None,
        quote_of: None,
        source_url: format!("https://x.com/testauthor/status/{id}"),
        captured_at: Utc::now(),
        fetch_method: FetchMethod::Browser,
    }
}

async fn edge_count(client: &GraphClient, id: &str) -> i64 {
    let q = query("MATCH (t:Tweet {id: $id})-[r]-() RETURN count(r) AS count").param("id", id);
    let mut stream = client.inner().execute(q).await.unwrap();
    stream
        .next()
        .await
        .unwrap()
        .map(|row| row.get::<i64>("count").unwrap_or(0))
        .unwrap_or(0)
}

async fn delete_tweet(client: &GraphClient, id: &str) {
    let q = query("MATCH (t:Tweet {id: $id}) DETACH DELETE t").param("id", id);
    client.inner().run(q).await.unwrap();
}

#[tokio::test]
#[ignore] // requires live Neo4j credentials
async fn merging_twice_is_idempotent() {
    let client = connect().await;
    let writer = GraphWriter::new(client.clone());
    let themes = BTreeSet::new();
    let entities = BTreeSet::new();

    let tweet = item("it-9001", "A complete thought about Rust.", false);
    delete_tweet(&client, &tweet.id).await;

    let first = writer
        .merge_item(&tweet, &themes, &entities, None)
        .await
        .unwrap();
    assert_eq!(first, MergeOutcome::Created);
    let edges_after_first = edge_count(&client, &tweet.id).await;

    let second = writer
        .merge_item(&tweet, &themes, &entities, None)
        .await
        .unwrap();
    assert_eq!(second, MergeOutcome::Skipped);
    assert_eq!(edge_count(&client, &tweet.id).await, edges_after_first);

    delete_tweet(&client, &tweet.id).await;
}

#[tokio::test]
#[ignore] // requires live Neo4j credentials
async fn full_text_replaces_truncated_but_never_regresses() {
    let client = connect().await;
    let writer = GraphWriter::new(client.clone());
    let themes = BTreeSet::new();
    let entities = BTreeSet::new();

    let truncated = item("it-9002", "Partial thought", true);
    delete_tweet(&client, &truncated.id).await;
    writer
        .merge_item(&truncated, &themes, &entities, None)
        .await
        .unwrap();

    let full = item("it-9002", "Partial thought, now completed in full.", false);
    let outcome = writer.merge_item(&full, &themes, &entities, None).await.unwrap();
    assert_eq!(outcome, MergeOutcome::Updated);

    // A late truncated re-capture must not regress the stored text.
    let regress = item("it-9002", "Partial thought", true);
    let outcome = writer
        .merge_item(&regress, &themes, &entities, None)
        .await
        .unwrap();
    assert_eq!(outcome, MergeOutcome::Skipped);

    let stored = writer.fetch_existing("it-9002").await.unwrap().unwrap();
    assert!(!stored.is_truncated);
    assert_eq!(stored.text, "Partial thought, now completed in full.");

    delete_tweet(&client, "it-9002").await;
}
