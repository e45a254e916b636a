//! Text embedding seam. Vectors power the graph's semantic search index;
//! the pipeline itself only needs "some floats or nothing".

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embed one text. An empty vector means "no embedding available".
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Embedder over any OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl HttpEmbedder {
    pub fn new(api_base: &str, api_key: &str, model: &str, dimensions: usize) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimensions,
        }
    }
}

#[async_trait]
impl TextEmbedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": text,
            "dimensions": self.dimensions,
        });

        let resp = self
            .client
            .post(format!("{}/embeddings", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Embedding request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            anyhow::bail!("Embedding API error (status {status}): {message}");
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .context("Failed to parse embedding response")?;
        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("Embedding response contained no vectors")
    }
}

/// Used when no embedding key is configured. Tweets are stored without
/// vectors and skip the semantic index.
pub struct NoopEmbedder;

#[async_trait]
impl TextEmbedder for NoopEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(Vec::new())
    }
}
