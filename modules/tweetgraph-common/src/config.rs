use std::env;

/// Application configuration loaded from environment variables.
///
/// Built once in `main` and passed by reference into each component; no
/// ambient mutable state.
#[derive(Debug, Clone)]
pub struct Config {
    // Neo4j
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,

    // Browser relay (capture driver control channel)
    pub browser_relay_url: String,
    pub browser_relay_token: Option<String>,

    // X API v2 enrichment. None disables the enrichment phase.
    pub x_bearer_token: Option<String>,
    /// Request budget per 15-minute window.
    pub xapi_window_budget: usize,

    // Embeddings (OpenAI-compatible endpoint). None disables embeddings.
    pub embedding_api_key: Option<String>,
    pub embedding_api_base: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,

    // Collector
    pub bookmarks_url: String,
    pub scroll_settle_ms: u64,
    pub stagnation_threshold: u32,

    // Sync state
    pub state_file: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            neo4j_uri: required_env("NEO4J_URI"),
            neo4j_user: required_env("NEO4J_USER"),
            neo4j_password: required_env("NEO4J_PASSWORD"),
            browser_relay_url: required_env("BROWSER_RELAY_URL"),
            browser_relay_token: optional_env("BROWSER_RELAY_TOKEN"),
            x_bearer_token: optional_env("X_BEARER_TOKEN"),
            xapi_window_budget: env::var("XAPI_WINDOW_BUDGET")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .expect("XAPI_WINDOW_BUDGET must be a number"),
            embedding_api_key: optional_env("EMBEDDING_API_KEY"),
            embedding_api_base: env::var("EMBEDDING_API_BASE")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            embedding_dimensions: env::var("EMBEDDING_DIMENSIONS")
                .unwrap_or_else(|_| "1536".to_string())
                .parse()
                .expect("EMBEDDING_DIMENSIONS must be a number"),
            bookmarks_url: env::var("BOOKMARKS_URL")
                .unwrap_or_else(|_| "https://x.com/i/bookmarks".to_string()),
            scroll_settle_ms: env::var("SCROLL_SETTLE_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()
                .expect("SCROLL_SETTLE_MS must be a number"),
            stagnation_threshold: env::var("STAGNATION_THRESHOLD")
                .unwrap_or_else(|_| "15".to_string())
                .parse()
                .expect("STAGNATION_THRESHOLD must be a number"),
            state_file: env::var("STATE_FILE").unwrap_or_else(|_| "state.json".to_string()),
        }
    }

    /// Log the configuration with secrets redacted.
    pub fn log_redacted(&self) {
        tracing::info!(
            neo4j_uri = self.neo4j_uri.as_str(),
            browser_relay_url = self.browser_relay_url.as_str(),
            enrichment_enabled = self.x_bearer_token.is_some(),
            embeddings_enabled = self.embedding_api_key.is_some(),
            embedding_model = self.embedding_model.as_str(),
            bookmarks_url = self.bookmarks_url.as_str(),
            state_file = self.state_file.as_str(),
            "Configuration loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}
