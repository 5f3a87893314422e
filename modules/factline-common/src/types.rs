use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// --- Content ---

/// One ordered text segment of a content unit, with its embedding vector.
/// A chunk whose embedding request failed is never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub embedding: Vec<f32>,
}

/// A single ingested article, deduplicated by URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentUnit {
    pub id: Uuid,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub source_name: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub fetched_at: DateTime<Utc>,
    pub chunks: Vec<Chunk>,
    pub processed: bool,
}

/// Fields for a content unit that has not been stored yet.
/// `id`, `fetched_at`, and `processed` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewContentUnit {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub source_name: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub chunks: Vec<Chunk>,
}

// --- Topics ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Election,
    Health,
    Disaster,
    Finance,
}

impl Category {
    /// Parse a category label from model output. Unknown labels fall back
    /// to `General` rather than failing the batch.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "election" => Category::Election,
            "health" => Category::Health,
            "disaster" => Category::Disaster,
            "finance" => Category::Finance,
            _ => Category::General,
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Category::General => write!(f, "general"),
            Category::Election => write!(f, "election"),
            Category::Health => write!(f, "health"),
            Category::Disaster => write!(f, "disaster"),
            Category::Finance => write!(f, "finance"),
        }
    }
}

/// A cluster of content units sharing a theme. Created by the clustering
/// stage; `claims_extracted` is flipped exactly once by claim extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    pub id: Uuid,
    pub title: String,
    pub summary: String,
    pub category: Category,
    pub unit_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub claims_extracted: bool,
}

// --- Claims ---

/// An atomic factual assertion. Two claims with the same `normalized_text`
/// are the same claim — the store enforces this with an atomic
/// find-or-create keyed on the normalized text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub id: Uuid,
    /// Owning topic; `None` for claims created by ad-hoc user submissions.
    pub topic_id: Option<Uuid>,
    pub text: String,
    pub normalized_text: String,
    pub created_at: DateTime<Utc>,
    pub verified: bool,
}

// --- Verifications ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Verdict {
    True,
    False,
    Unclear,
}

impl Verdict {
    /// Parse a stored verdict label. Anything unrecognized reads as `Unclear`.
    pub fn parse_lenient(s: &str) -> Self {
        match s {
            "True" => Verdict::True,
            "False" => Verdict::False,
            _ => Verdict::Unclear,
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::True => write!(f, "True"),
            Verdict::False => write!(f, "False"),
            Verdict::Unclear => write!(f, "Unclear"),
        }
    }
}

/// One scoring event for a claim. Rows are append-only: re-verification
/// inserts a new row, and only the derived `refined_explanation` field may
/// be written after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub id: Uuid,
    pub claim_id: Uuid,
    pub claim_text: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub source_quality: f64,
    pub public_explanation: String,
    pub analyst_explanation: String,
    /// Concise rewrite of `analyst_explanation`, produced by the refinement
    /// stage. The original explanation is never edited.
    pub refined_explanation: Option<String>,
    pub sources: Vec<String>,
    pub scored_at: DateTime<Utc>,
}

// --- Evidence views ---

/// Evidence drawn from stored chunks by the retrieval engine. Derived,
/// never persisted.
#[derive(Debug, Clone)]
pub struct EvidenceChunk {
    pub text: String,
    pub score: f64,
    pub source_title: String,
    pub source_url: String,
}

/// One row of the merged evidence list fed to the verdict model.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceItem {
    pub title: String,
    pub text: String,
    pub url: String,
    pub source: String,
}

// --- Collaborator payloads ---

/// An article as returned by the news collaborator. Articles without a URL
/// or title are dropped at the fetch boundary.
#[derive(Debug, Clone)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub source_name: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// One result from the external evidence search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_parse_lenient_falls_back_to_general() {
        assert_eq!(Category::parse_lenient("health"), Category::Health);
        assert_eq!(Category::parse_lenient(" Election "), Category::Election);
        assert_eq!(Category::parse_lenient("sports"), Category::General);
        assert_eq!(Category::parse_lenient(""), Category::General);
    }

    #[test]
    fn category_roundtrips_through_display() {
        for c in [
            Category::General,
            Category::Election,
            Category::Health,
            Category::Disaster,
            Category::Finance,
        ] {
            assert_eq!(Category::parse_lenient(&c.to_string()), c);
        }
    }

    #[test]
    fn verdict_parse_lenient_defaults_to_unclear() {
        assert_eq!(Verdict::parse_lenient("True"), Verdict::True);
        assert_eq!(Verdict::parse_lenient("False"), Verdict::False);
        assert_eq!(Verdict::parse_lenient("maybe"), Verdict::Unclear);
    }

    #[test]
    fn verdict_serde_uses_capitalized_labels() {
        let json = serde_json::to_string(&Verdict::True).unwrap();
        assert_eq!(json, "\"True\"");
        let parsed: Verdict = serde_json::from_str("\"Unclear\"").unwrap();
        assert_eq!(parsed, Verdict::Unclear);
    }
}
