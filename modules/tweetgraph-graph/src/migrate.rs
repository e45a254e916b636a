use neo4rs::query;
use tracing::{info, warn};

use crate::GraphClient;

/// Run idempotent schema migrations: natural-key constraints and the tweet
/// embedding vector index. Safe to run at every start; "already exists"
/// errors are ignored.
pub async fn migrate(client: &GraphClient, embedding_dimensions: usize) -> Result<(), neo4rs::Error> {
    let g = &client.graph;

    info!("Running schema migrations...");

    // --- Natural-key uniqueness constraints ---
    // Merges target these keys; uniqueness makes repeated merges idempotent
    // at the database level too.
    let constraints = [
        "CREATE CONSTRAINT ON (t:Tweet) ASSERT t.id IS UNIQUE",
        "CREATE CONSTRAINT ON (u:User) ASSERT u.username IS UNIQUE",
        "CREATE CONSTRAINT ON (h:Hashtag) ASSERT h.tag IS UNIQUE",
        "CREATE CONSTRAINT ON (th:Theme) ASSERT th.name IS UNIQUE",
        "CREATE CONSTRAINT ON (e:Entity) ASSERT e.name IS UNIQUE",
        "CREATE CONSTRAINT ON (l:URL) ASSERT l.url IS UNIQUE",
    ];

    for c in &constraints {
        run_ignoring_exists(g, c).await?;
    }
    info!("Natural-key constraints created");

    // --- Property indexes ---
    let indexes = [
        "CREATE INDEX ON :Tweet(is_truncated)",
        "CREATE INDEX ON :Tweet(captured_at)",
    ];

    for idx in &indexes {
        run_ignoring_exists(g, idx).await?;
    }
    info!("Property indexes created");

    // --- Vector index for semantic search over tweet text ---
    let vector = format!(
        r#"CREATE VECTOR INDEX tweet_embedding ON :Tweet(embedding) WITH CONFIG {{"dimension": {embedding_dimensions}, "capacity": 100000, "metric": "cos"}}"#
    );
    run_ignoring_exists(g, &vector).await?;
    info!(dimensions = embedding_dimensions, "Vector index created");

    Ok(())
}

async fn run_ignoring_exists(g: &neo4rs::Graph, cypher: &str) -> Result<(), neo4rs::Error> {
    match g.run(query(cypher)).await {
        Ok(_) => Ok(()),
        Err(e) => {
            let msg = e.to_string().to_lowercase();
            if msg.contains("already exists") || msg.contains("equivalent") {
                warn!(
                    "Already exists (skipped): {}",
                    cypher.chars().take(80).collect::<String>()
                );
                Ok(())
            } else {
                Err(e)
            }
        }
    }
}
