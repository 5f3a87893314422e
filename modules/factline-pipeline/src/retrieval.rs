// Internal evidence retrieval: linear cosine scan over a bounded recency
// window of stored chunks. O(window * chunks-per-unit) per query — fine at
// this corpus size, and the `retrieve` contract is stable so an ANN index
// can replace the scan without touching callers.

use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};

use factline_common::EvidenceChunk;
use factline_store::Store;

use crate::traits::TextEmbedder;

/// How many of the most recently fetched units are scanned per query.
/// Older evidence falls out of the window by design.
const RETRIEVAL_WINDOW: usize = 50;

/// Default number of evidence chunks returned per query.
pub const DEFAULT_TOP_K: usize = 5;

pub struct Retriever {
    store: Arc<dyn Store>,
    embedder: Arc<dyn TextEmbedder>,
}

impl Retriever {
    pub fn new(store: Arc<dyn Store>, embedder: Arc<dyn TextEmbedder>) -> Self {
        Self { store, embedder }
    }

    /// Rank stored chunks against the query by cosine similarity and return
    /// the top `k`, best first.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<EvidenceChunk>> {
        let query_embedding = self
            .embedder
            .embed(query)
            .await
            .context("Failed to embed retrieval query")?;

        let units = self.store.recent_units_with_chunks(RETRIEVAL_WINDOW).await?;

        let mut scored = Vec::new();
        for unit in &units {
            for chunk in &unit.chunks {
                scored.push(EvidenceChunk {
                    text: chunk.text.clone(),
                    score: cosine_similarity(&query_embedding, &chunk.embedding),
                    source_title: unit.title.clone(),
                    source_url: unit.url.clone(),
                });
            }
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }
}

/// Cosine similarity `dot(a,b) / (|a|·|b|)`. Zero-length and zero-norm
/// vectors score 0.0 (similarity is undefined there, and excluding beats
/// NaN poisoning the sort).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| *x as f64 * *y as f64)
        .sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    use factline_common::{Chunk, NewContentUnit};
    use factline_store::MemoryStore;

    use crate::testing::ConstEmbedder;

    #[test]
    fn cosine_is_symmetric_and_bounded() {
        let vectors = [
            (vec![1.0_f32, 2.0, 3.0], vec![-3.0_f32, 1.0, 0.5]),
            (vec![0.1, 0.9], vec![0.9, 0.1]),
            (vec![1.0, 0.0], vec![-1.0, 0.0]),
        ];
        for (a, b) in &vectors {
            let ab = cosine_similarity(a, b);
            let ba = cosine_similarity(b, a);
            assert!((ab - ba).abs() < 1e-12, "not symmetric: {ab} vs {ba}");
            assert!((-1.0..=1.0).contains(&ab), "out of bounds: {ab}");
        }
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn identical_vectors_score_one() {
        let v = vec![0.3_f32, 0.4, 0.5];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    fn unit_with_chunk(url: &str, title: &str, embedding: Vec<f32>) -> NewContentUnit {
        NewContentUnit {
            url: url.to_string(),
            title: title.to_string(),
            description: None,
            content: None,
            source_name: None,
            published_at: None,
            chunks: vec![Chunk {
                text: format!("{title} body"),
                embedding,
            }],
        }
    }

    #[tokio::test]
    async fn retrieval_ranks_by_descending_similarity() {
        let store = Arc::new(MemoryStore::new());
        for (url, title, embedding) in [
            ("https://a.example/1", "orthogonal", vec![0.0, 1.0]),
            ("https://a.example/2", "aligned", vec![1.0, 0.0]),
            ("https://a.example/3", "diagonal", vec![1.0, 1.0]),
        ] {
            store
                .upsert_unit_if_absent(unit_with_chunk(url, title, embedding))
                .await
                .unwrap();
        }

        let embedder = Arc::new(ConstEmbedder::new(vec![1.0, 0.0]));
        let retriever = Retriever::new(store, embedder);
        let results = retriever.retrieve("query", 3).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].source_title, "aligned");
        for pair in results.windows(2) {
            assert!(
                pair[0].score >= pair[1].score,
                "scores must be non-increasing"
            );
        }
    }

    #[tokio::test]
    async fn retrieval_honors_top_k_and_zero_vectors() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_unit_if_absent(unit_with_chunk(
                "https://a.example/z",
                "zero",
                vec![0.0, 0.0],
            ))
            .await
            .unwrap();
        store
            .upsert_unit_if_absent(unit_with_chunk(
                "https://a.example/a",
                "aligned",
                vec![1.0, 0.0],
            ))
            .await
            .unwrap();

        let embedder = Arc::new(ConstEmbedder::new(vec![1.0, 0.0]));
        let retriever = Retriever::new(store, embedder);

        let results = retriever.retrieve("query", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source_title, "aligned");
        assert!((results[0].score - 1.0).abs() < 1e-9);
    }
}
