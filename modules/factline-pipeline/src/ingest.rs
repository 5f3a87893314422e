use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use factline_common::{Chunk, NewContentUnit};
use factline_store::Store;

use crate::chunker::{chunk_text, MAX_CHUNK_CHARS};
use crate::traits::{NewsFetcher, TextEmbedder};

#[derive(Debug, Default)]
pub struct IngestStats {
    pub fetched: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub chunks_dropped: usize,
}

/// Ingestion stage: pull current headlines, dedupe by canonical URL, chunk
/// the text on sentence boundaries, attach embeddings, persist.
pub struct IngestStage {
    store: Arc<dyn Store>,
    news: Arc<dyn NewsFetcher>,
    embedder: Arc<dyn TextEmbedder>,
}

impl IngestStage {
    pub fn new(
        store: Arc<dyn Store>,
        news: Arc<dyn NewsFetcher>,
        embedder: Arc<dyn TextEmbedder>,
    ) -> Self {
        Self {
            store,
            news,
            embedder,
        }
    }

    pub async fn run(&self) -> Result<IngestStats> {
        let articles = self
            .news
            .top_headlines()
            .await
            .context("Failed to fetch headlines")?;

        let mut stats = IngestStats {
            fetched: articles.len(),
            ..Default::default()
        };

        for article in articles {
            // Cheap duplicate check before paying for embeddings. The
            // store's upsert below is still the authoritative guard.
            if self.store.get_unit_by_url(&article.url).await?.is_some() {
                stats.duplicates += 1;
                continue;
            }

            let full_text = format!(
                "{}. {}. {}",
                article.title,
                article.description.as_deref().unwrap_or_default(),
                article.content.as_deref().unwrap_or_default()
            );

            let mut chunks = Vec::new();
            for text in chunk_text(&full_text, MAX_CHUNK_CHARS) {
                // A failed embedding drops only this chunk; partial evidence
                // beats discarding the article. No retry within a run.
                match self.embedder.embed(&text).await {
                    Ok(embedding) => chunks.push(Chunk { text, embedding }),
                    Err(e) => {
                        stats.chunks_dropped += 1;
                        warn!(url = article.url.as_str(), error = %e, "Dropping chunk without embedding");
                    }
                }
            }

            let (_, created) = self
                .store
                .upsert_unit_if_absent(NewContentUnit {
                    url: article.url,
                    title: article.title,
                    description: article.description,
                    content: article.content,
                    source_name: article.source_name,
                    published_at: article.published_at,
                    chunks,
                })
                .await?;

            if created {
                stats.stored += 1;
            } else {
                stats.duplicates += 1;
            }
        }

        info!(
            fetched = stats.fetched,
            stored = stats.stored,
            duplicates = stats.duplicates,
            chunks_dropped = stats.chunks_dropped,
            "Ingestion run complete"
        );
        Ok(stats)
    }
}
