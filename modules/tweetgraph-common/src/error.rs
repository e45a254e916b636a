use thiserror::Error;

#[derive(Error, Debug)]
pub enum TweetGraphError {
    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Enrichment error: {0}")]
    Enrichment(String),

    #[error("Enrichment authentication failed: {0}")]
    EnrichmentAuth(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
