// Test mocks for the pipeline's collaborator seams.
//
// One mock per trait boundary:
// - MockNewsFetcher (NewsFetcher) — canned headlines + per-query search hits
// - FixedEmbedder / ConstEmbedder (TextEmbedder) — deterministic vectors
// - MockClassifier (TopicClassifier) — canned clusters or a schema failure
// - MockDecomposer (ClaimDecomposer) — claims keyed by topic title
// - MockVerdictModel (VerdictModel) — canned response, records calls
// - MockRefiner (ExplanationRefiner) — deterministic rewrite
//
// Together with MemoryStore these make every stage testable with no
// network, no database, no Docker.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use factline_common::{Article, EvidenceItem, FactlineError, SearchHit, Verdict};

use crate::traits::{
    ArticleDigest, ClaimDecomposer, ExplanationRefiner, NewsFetcher, TextEmbedder, TopicCluster,
    TopicClassifier, VerdictModel,
};
use crate::verdict::VerdictResponse;

/// Build a minimal article for ingestion tests.
pub fn article(url: &str, title: &str, description: &str) -> Article {
    Article {
        url: url.to_string(),
        title: title.to_string(),
        description: Some(description.to_string()),
        content: Some(format!("{description} Full body text follows here.")),
        source_name: Some("Test Wire".to_string()),
        published_at: None,
    }
}

// ---------------------------------------------------------------------------
// Embedders
// ---------------------------------------------------------------------------

/// Embedder returning the same vector for every input. Lets a test choose
/// the exact query geometry.
pub struct ConstEmbedder {
    vector: Vec<f32>,
}

impl ConstEmbedder {
    pub fn new(vector: Vec<f32>) -> Self {
        Self { vector }
    }
}

#[async_trait]
impl TextEmbedder for ConstEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }
}

/// Deterministic hash-based embedder. Optionally refuses texts containing a
/// marker, for exercising the drop-failed-chunks path.
pub struct FixedEmbedder {
    dim: usize,
    fail_on: Option<String>,
}

impl FixedEmbedder {
    pub fn new() -> Self {
        Self {
            dim: 8,
            fail_on: None,
        }
    }

    pub fn fail_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }
}

impl Default for FixedEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextEmbedder for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(marker) = &self.fail_on {
            if text.contains(marker) {
                bail!("embedding refused for text containing '{marker}'");
            }
        }
        let mut vector = vec![0.0_f32; self.dim];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dim] += byte as f32 / 255.0;
        }
        Ok(vector)
    }
}

// ---------------------------------------------------------------------------
// MockNewsFetcher
// ---------------------------------------------------------------------------

/// Builder-style news fetcher: `.with_headlines()`, `.on_search()`.
/// Unregistered queries return the default hits (empty unless set).
pub struct MockNewsFetcher {
    headlines: Vec<Article>,
    searches: HashMap<String, Vec<SearchHit>>,
    default_hits: Vec<SearchHit>,
}

impl MockNewsFetcher {
    pub fn new() -> Self {
        Self {
            headlines: Vec::new(),
            searches: HashMap::new(),
            default_hits: Vec::new(),
        }
    }

    pub fn with_headlines(mut self, articles: Vec<Article>) -> Self {
        self.headlines = articles;
        self
    }

    pub fn on_search(mut self, query: &str, hits: Vec<SearchHit>) -> Self {
        self.searches.insert(query.to_string(), hits);
        self
    }

    pub fn with_default_search(mut self, hits: Vec<SearchHit>) -> Self {
        self.default_hits = hits;
        self
    }
}

impl Default for MockNewsFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NewsFetcher for MockNewsFetcher {
    async fn top_headlines(&self) -> Result<Vec<Article>> {
        Ok(self.headlines.clone())
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        Ok(self
            .searches
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.default_hits.clone()))
    }
}

// ---------------------------------------------------------------------------
// MockClassifier
// ---------------------------------------------------------------------------

/// Canned classification result, or the schema failure a malformed model
/// payload would produce.
pub enum MockClassifier {
    Clusters(Vec<TopicCluster>),
    SchemaFailure(String),
}

#[async_trait]
impl TopicClassifier for MockClassifier {
    async fn classify(&self, _digests: &[ArticleDigest]) -> Result<Vec<TopicCluster>> {
        match self {
            MockClassifier::Clusters(clusters) => Ok(clusters.clone()),
            MockClassifier::SchemaFailure(reason) => {
                Err(FactlineError::Schema(reason.clone()).into())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MockDecomposer
// ---------------------------------------------------------------------------

/// Decomposition keyed by topic title; unregistered topics fail like a dead
/// collaborator. Core-claim extraction echoes the input unless overridden.
pub struct MockDecomposer {
    by_title: HashMap<String, Vec<String>>,
    core_claim: Option<String>,
}

impl MockDecomposer {
    pub fn new() -> Self {
        Self {
            by_title: HashMap::new(),
            core_claim: None,
        }
    }

    pub fn on_topic(mut self, title: &str, claims: &[&str]) -> Self {
        self.by_title
            .insert(title.to_string(), claims.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_core_claim(mut self, claim: &str) -> Self {
        self.core_claim = Some(claim.to_string());
        self
    }
}

impl Default for MockDecomposer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClaimDecomposer for MockDecomposer {
    async fn decompose(&self, topic_title: &str, _topic_summary: &str) -> Result<Vec<String>> {
        match self.by_title.get(topic_title) {
            Some(claims) => Ok(claims.clone()),
            None => bail!("no decomposition registered for topic '{topic_title}'"),
        }
    }

    async fn extract_core_claim(&self, text: &str) -> Result<String> {
        Ok(self
            .core_claim
            .clone()
            .unwrap_or_else(|| text.trim().to_string()))
    }
}

// ---------------------------------------------------------------------------
// MockVerdictModel
// ---------------------------------------------------------------------------

/// Canned verdict response; records `(claim, evidence_len)` per call so
/// tests can assert what the model was shown.
pub struct MockVerdictModel {
    response: VerdictResponse,
    calls: Mutex<Vec<(String, usize)>>,
}

impl MockVerdictModel {
    pub fn returning(response: VerdictResponse) -> Self {
        Self {
            response,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// A "True" verdict with the given confidence and no cited sources.
    pub fn affirm(confidence: Option<f64>) -> Self {
        Self::returning(VerdictResponse {
            verdict: Verdict::True,
            confidence,
            public_explanation: Some("The evidence supports this.".to_string()),
            analyst_explanation: Some("Multiple items corroborate the claim.".to_string()),
            sources: Vec::new(),
        })
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().expect("mock call log poisoned").clone()
    }
}

#[async_trait]
impl VerdictModel for MockVerdictModel {
    async fn score(&self, claim: &str, evidence: &[EvidenceItem]) -> Result<VerdictResponse> {
        self.calls
            .lock()
            .expect("mock call log poisoned")
            .push((claim.to_string(), evidence.len()));
        Ok(self.response.clone())
    }
}

// ---------------------------------------------------------------------------
// MockRefiner
// ---------------------------------------------------------------------------

/// Deterministic rewrite, prefix-tagged so tests can tell original from
/// refined text.
pub struct MockRefiner;

#[async_trait]
impl ExplanationRefiner for MockRefiner {
    async fn refine(&self, explanation: &str) -> Result<String> {
        Ok(format!("refined: {explanation}"))
    }
}
