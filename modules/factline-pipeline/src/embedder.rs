use anyhow::Result;
use async_trait::async_trait;

use ai_client::OpenAi;

use crate::traits::{into_pipeline_error, TextEmbedder};

/// Embeddings via an OpenAI-compatible endpoint (Voyage by default).
pub struct Embedder {
    client: OpenAi,
}

impl Embedder {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        let client = OpenAi::new(api_key, model)
            .with_base_url(base_url)
            .with_embedding_model(model);
        Self { client }
    }
}

#[async_trait]
impl TextEmbedder for Embedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(text).await.map_err(into_pipeline_error)
    }
}

/// Embedder for assembly paths that must never embed (for example a
/// read-only maintenance run). Calling it is a bug, so it fails loudly.
pub struct NoOpEmbedder;

#[async_trait]
impl TextEmbedder for NoOpEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        anyhow::bail!("embedding is disabled in this configuration")
    }
}
