// Trait abstractions for the pipeline's collaborators.
//
// Every external call sits behind one of these seams: news fetch/search,
// embeddings, topic classification, claim decomposition, verdict scoring,
// and explanation refinement. The production implementations wrap HTTP
// clients; the mocks in `testing` make every stage testable with no
// network, no database, no Docker.

use anyhow::Result;
use async_trait::async_trait;

use ai_client::AiClientError;
use factline_common::{Article, Category, EvidenceItem, FactlineError, SearchHit};

use crate::verdict::VerdictResponse;

// ---------------------------------------------------------------------------
// NewsFetcher — headline ingestion + evidence search
// ---------------------------------------------------------------------------

#[async_trait]
pub trait NewsFetcher: Send + Sync {
    /// Current top headlines for the ingestion stage. Articles without a
    /// URL or title are dropped at this boundary.
    async fn top_headlines(&self) -> Result<Vec<Article>>;

    /// Relevance-ranked article search used as external claim evidence.
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>>;
}

// ---------------------------------------------------------------------------
// TextEmbedder
// ---------------------------------------------------------------------------

#[async_trait]
pub trait TextEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

// ---------------------------------------------------------------------------
// TopicClassifier
// ---------------------------------------------------------------------------

/// An indexed digest of one article handed to the classifier. The index is
/// the article's position within the batch; the classifier refers back to
/// articles by these indices.
#[derive(Debug, Clone)]
pub struct ArticleDigest {
    pub index: usize,
    pub title: String,
    pub description: String,
}

/// One topic grouping returned by the classifier, already schema-validated.
/// Index range validation against the batch is the clustering stage's job.
#[derive(Debug, Clone)]
pub struct TopicCluster {
    pub title: String,
    pub summary: String,
    pub category: Category,
    pub member_indices: Vec<usize>,
}

#[async_trait]
pub trait TopicClassifier: Send + Sync {
    async fn classify(&self, digests: &[ArticleDigest]) -> Result<Vec<TopicCluster>>;
}

// ---------------------------------------------------------------------------
// ClaimDecomposer
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ClaimDecomposer: Send + Sync {
    /// Decompose a topic into atomic, independently verifiable claims.
    async fn decompose(&self, topic_title: &str, topic_summary: &str) -> Result<Vec<String>>;

    /// Extract the single most significant claim from free text
    /// (the synchronous submission path).
    async fn extract_core_claim(&self, text: &str) -> Result<String>;
}

// ---------------------------------------------------------------------------
// VerdictModel
// ---------------------------------------------------------------------------

#[async_trait]
pub trait VerdictModel: Send + Sync {
    async fn score(&self, claim: &str, evidence: &[EvidenceItem]) -> Result<VerdictResponse>;
}

// ---------------------------------------------------------------------------
// ExplanationRefiner
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ExplanationRefiner: Send + Sync {
    /// Rewrite an analyst explanation to be more concise without losing
    /// key points.
    async fn refine(&self, explanation: &str) -> Result<String>;
}

/// Lift an ai-client error into the pipeline error taxonomy: payloads that
/// failed schema validation become `FactlineError::Schema`, everything else
/// stays a transient collaborator failure.
pub(crate) fn into_pipeline_error(e: AiClientError) -> anyhow::Error {
    match e {
        AiClientError::InvalidPayload { .. } => {
            anyhow::Error::new(FactlineError::Schema(e.to_string()))
        }
        other => anyhow::Error::new(other),
    }
}
