use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use neo4rs::query;
use tracing::info;

use tweetgraph_common::{BookmarkItem, FetchMethod, MergeOutcome, StoredTweet};

use crate::reconcile::{reconcile, MergeAction};
use crate::GraphClient;

/// Write-side wrapper for the graph. The sync pipeline is the only writer;
/// other processes read.
///
/// Every node is keyed by its natural key (tweet id, username, tag, theme
/// name, entity name, url), and every edge is a `MERGE` on
/// (type, source-key, target-key), so merging the same item any number of
/// times leaves the graph unchanged after the first.
pub struct GraphWriter {
    client: GraphClient,
}

/// Node/edge counts for the run summary.
#[derive(Debug, Default)]
pub struct GraphStats {
    pub tweets: u64,
    pub users: u64,
    pub hashtags: u64,
    pub themes: u64,
    pub entities: u64,
    pub relationships: u64,
}

impl GraphWriter {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    /// Merge one item and its derived relationships into the graph.
    ///
    /// Idempotent upsert: the [`reconcile`] policy decides between create,
    /// text overwrite, author backfill, and no-op. Theme and entity edges are
    /// re-merged from the current text on every create/overwrite.
    pub async fn merge_item(
        &self,
        item: &BookmarkItem,
        themes: &BTreeSet<String>,
        entities: &BTreeSet<String>,
        embedding: Option<&[f32]>,
    ) -> Result<MergeOutcome, neo4rs::Error> {
        let existing = self.fetch_existing(&item.id).await?;

        match reconcile(existing.as_ref(), item) {
            MergeAction::Create => {
                self.upsert_tweet(item, embedding).await?;
                self.merge_semantics(&item.id, themes, entities).await?;
                info!(id = item.id.as_str(), "Stored new tweet");
                Ok(MergeOutcome::Created)
            }
            MergeAction::OverwriteText => {
                self.upsert_tweet(item, embedding).await?;
                self.merge_semantics(&item.id, themes, entities).await?;
                info!(id = item.id.as_str(), "Replaced truncated text with full text");
                Ok(MergeOutcome::Updated)
            }
            MergeAction::BackfillAuthor => {
                let username = item
                    .author_username
                    .as_deref()
                    .expect("BackfillAuthor implies an author");
                self.backfill_author(&item.id, username).await?;
                info!(id = item.id.as_str(), username, "Backfilled author");
                Ok(MergeOutcome::Updated)
            }
            MergeAction::Skip => Ok(MergeOutcome::Skipped),
        }
    }

    /// Load the stored copy of a tweet, if any.
    pub async fn fetch_existing(&self, id: &str) -> Result<Option<StoredTweet>, neo4rs::Error> {
        let q = query(
            "MATCH (t:Tweet {id: $id})
             OPTIONAL MATCH (u:User)-[:POSTED]->(t)
             RETURN t.text AS text,
                    coalesce(t.is_truncated, true) AS is_truncated,
                    coalesce(t.author_username, '') AS author_username,
                    count(u) AS posted_count",
        )
        .param("id", id);

        let mut stream = self.client.graph.execute(q).await?;
        if let Some(row) = stream.next().await? {
            let author_username: String = row.get("author_username").unwrap_or_default();
            let posted_count: i64 = row.get("posted_count").unwrap_or(0);
            Ok(Some(StoredTweet {
                id: id.to_string(),
                text: row.get("text").unwrap_or_default(),
                is_truncated: row.get("is_truncated").unwrap_or(true),
                has_author: posted_count > 0 || !author_username.is_empty(),
            }))
        } else {
            Ok(None)
        }
    }

    /// Upsert the tweet node and all edges derivable from the item itself.
    ///
    /// REPLY_TO / QUOTES edges are created only when the referenced tweet is
    /// already in the graph; a later sync that stores the target re-merges
    /// this item's edges naturally on re-capture.
    async fn upsert_tweet(
        &self,
        item: &BookmarkItem,
        embedding: Option<&[f32]>,
    ) -> Result<(), neo4rs::Error> {
        let q = query(
            "MERGE (t:Tweet {id: $id})
             SET t.text = $text,
                 t.is_truncated = $is_truncated,
                 t.author_username = $author_username,
                 t.source_url = $source_url,
                 t.captured_at = datetime($captured_at),
                 t.fetch_method = $fetch_method
             FOREACH (_ IN CASE WHEN size($embedding) > 0 THEN [1] ELSE [] END |
                 SET t.embedding = $embedding)
             WITH t
             FOREACH (_ IN CASE WHEN $author_username <> '' THEN [1] ELSE [] END |
                 MERGE (u:User {username: $author_username})
                 MERGE (u)-[:POSTED]->(t))
             FOREACH (tag IN $hashtags |
                 MERGE (h:Hashtag {tag: tag})
                 MERGE (t)-[:HAS_HASHTAG]->(h))
             FOREACH (name IN $mentions |
                 MERGE (m:User {username: name})
                 MERGE (t)-[:MENTIONS]->(m))
             FOREACH (link IN $urls |
                 MERGE (l:URL {url: link})
                 MERGE (t)-[:CONTAINS_URL]->(l))
             WITH t
             OPTIONAL MATCH (parent:Tweet {id: $reply_to})
             FOREACH (_ IN CASE WHEN parent IS NOT NULL THEN [1] ELSE [] END |
                 MERGE (t)-[:REPLY_TO]->(parent))
             WITH t
             OPTIONAL MATCH (quoted:Tweet {id: $quote_of})
             FOREACH (_ IN CASE WHEN quoted IS NOT NULL THEN [1] ELSE [] END |
                 MERGE (t)-[:QUOTES]->(quoted))",
        )
        .param("id", item.id.as_str())
        .param("text", item.text.as_str())
        .param("is_truncated", item.is_truncated)
        .param(
            "author_username",
            item.author_username.as_deref().unwrap_or(""),
        )
        .param("source_url", item.source_url.as_str())
        .param("captured_at", format_datetime(&item.captured_at))
        .param("fetch_method", fetch_method_str(item.fetch_method))
        .param("hashtags", set_to_vec(&item.hashtags))
        .param("mentions", set_to_vec(&item.mentions))
        .param("urls", item.urls.clone())
        .param("reply_to", item.reply_to.clone())
        .param("quote_of", item.quote_of.clone())
        .param(
            "embedding",
            embedding.map(embedding_to_f64).unwrap_or_default(),
        );

        self.client.graph.run(q).await
    }

    /// Re-merge theme and entity edges for a tweet. Derived from the current
    /// text on every call; stale edges from an earlier truncated capture are
    /// left in place (they were true of that text) and naturally converge as
    /// full text arrives.
    async fn merge_semantics(
        &self,
        id: &str,
        themes: &BTreeSet<String>,
        entities: &BTreeSet<String>,
    ) -> Result<(), neo4rs::Error> {
        if themes.is_empty() && entities.is_empty() {
            return Ok(());
        }

        let q = query(
            "MATCH (t:Tweet {id: $id})
             FOREACH (name IN $themes |
                 MERGE (th:Theme {name: name})
                 MERGE (t)-[:ABOUT_THEME]->(th))
             FOREACH (name IN $entities |
                 MERGE (e:Entity {name: name})
                 MERGE (t)-[:MENTIONS_ENTITY]->(e))",
        )
        .param("id", id)
        .param("themes", set_to_vec(themes))
        .param("entities", set_to_vec(entities));

        self.client.graph.run(q).await
    }

    /// Attach the POSTED edge for a tweet whose author was unknown at first
    /// capture. Text is not touched.
    async fn backfill_author(&self, id: &str, username: &str) -> Result<(), neo4rs::Error> {
        let q = query(
            "MATCH (t:Tweet {id: $id})
             SET t.author_username = $username
             MERGE (u:User {username: $username})
             MERGE (u)-[:POSTED]->(t)",
        )
        .param("id", id)
        .param("username", username);

        self.client.graph.run(q).await
    }

    /// Ids of stored tweets still flagged truncated, newest first. Input for
    /// the repair pass.
    pub async fn get_truncated_ids(&self) -> Result<Vec<String>, neo4rs::Error> {
        let q = query(
            "MATCH (t:Tweet)
             WHERE coalesce(t.is_truncated, true) = true
             RETURN t.id AS id
             ORDER BY t.captured_at DESC",
        );

        let mut ids = Vec::new();
        let mut stream = self.client.graph.execute(q).await?;
        while let Some(row) = stream.next().await? {
            if let Ok(id) = row.get::<String>("id") {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    /// Node and relationship counts.
    pub async fn get_stats(&self) -> Result<GraphStats, neo4rs::Error> {
        let mut stats = GraphStats::default();
        stats.tweets = self.count("MATCH (t:Tweet) RETURN count(t) AS count").await?;
        stats.users = self.count("MATCH (u:User) RETURN count(u) AS count").await?;
        stats.hashtags = self.count("MATCH (h:Hashtag) RETURN count(h) AS count").await?;
        stats.themes = self.count("MATCH (th:Theme) RETURN count(th) AS count").await?;
        stats.entities = self.count("MATCH (e:Entity) RETURN count(e) AS count").await?;
        stats.relationships = self.count("MATCH ()-[r]->() RETURN count(r) AS count").await?;
        Ok(stats)
    }

    async fn count(&self, cypher: &str) -> Result<u64, neo4rs::Error> {
        let mut stream = self.client.graph.execute(query(cypher)).await?;
        if let Some(row) = stream.next().await? {
            Ok(row.get::<i64>("count").unwrap_or(0) as u64)
        } else {
            Ok(0)
        }
    }
}

fn set_to_vec(set: &BTreeSet<String>) -> Vec<String> {
    set.iter().cloned().collect()
}

fn fetch_method_str(method: FetchMethod) -> &'static str {
    match method {
        FetchMethod::Browser => "browser",
        FetchMethod::Api => "api",
    }
}

fn embedding_to_f64(embedding: &[f32]) -> Vec<f64> {
    embedding.iter().map(|&v| v as f64).collect()
}

/// Format a DateTime<Utc> as a local datetime string without timezone offset.
/// Neo4j's datetime() requires "YYYY-MM-DDThh:mm:ss" format (no +00:00 suffix).
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}
