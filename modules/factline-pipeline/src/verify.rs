use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use factline_common::{source_quality, Claim, EvidenceItem, Verdict, Verification};
use factline_store::Store;

use crate::retrieval::{Retriever, DEFAULT_TOP_K};
use crate::traits::{NewsFetcher, VerdictModel};

/// How many unverified claims one verification run takes on.
const VERIFY_BATCH_SIZE: usize = 5;

/// How many prior verifications are attached as history context.
const HISTORY_LIMIT: usize = 5;

#[derive(Debug, Default)]
pub struct VerifyStats {
    pub claims: usize,
    pub verified: usize,
    pub failed: usize,
}

/// Summary of an earlier scoring of the same normalized claim.
#[derive(Debug, Clone, Serialize)]
pub struct PriorVerification {
    pub verdict: Verdict,
    pub confidence: f64,
    pub scored_at: DateTime<Utc>,
}

/// Result handed back to synchronous callers.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub claim_id: Uuid,
    pub claim_text: String,
    pub verdict: Verdict,
    pub confidence: f64,
    pub source_quality: f64,
    pub public_explanation: String,
    pub analyst_explanation: String,
    pub sources: Vec<String>,
    /// True when the claim existed (and had history) before this scoring.
    pub is_duplicate: bool,
    /// Up to five prior scorings of the same normalized text. Context for
    /// the caller only — never fed back into scoring.
    pub previous_verifications: Vec<PriorVerification>,
}

/// Verification stage: score each unverified claim against merged internal
/// and external evidence. Each claim is isolated — a malformed verdict or a
/// dead collaborator fails that claim alone and leaves it unverified for
/// the next run.
pub struct VerifyStage {
    store: Arc<dyn Store>,
    retriever: Retriever,
    news: Arc<dyn NewsFetcher>,
    verdict_model: Arc<dyn VerdictModel>,
}

impl VerifyStage {
    pub fn new(
        store: Arc<dyn Store>,
        retriever: Retriever,
        news: Arc<dyn NewsFetcher>,
        verdict_model: Arc<dyn VerdictModel>,
    ) -> Self {
        Self {
            store,
            retriever,
            news,
            verdict_model,
        }
    }

    pub async fn run(&self) -> Result<VerifyStats> {
        let claims = self.store.find_unverified_claims(VERIFY_BATCH_SIZE).await?;
        if claims.is_empty() {
            debug!("No unverified claims");
            return Ok(VerifyStats::default());
        }

        let mut stats = VerifyStats {
            claims: claims.len(),
            ..Default::default()
        };

        for claim in &claims {
            match self.verify_one(claim).await {
                Ok(outcome) => {
                    stats.verified += 1;
                    debug!(claim = %claim.id, verdict = %outcome.verdict, "Claim verified");
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(claim = %claim.id, error = %e, "Verification failed, claim left for retry");
                }
            }
        }

        info!(
            claims = stats.claims,
            verified = stats.verified,
            failed = stats.failed,
            "Verification run complete"
        );
        Ok(stats)
    }

    /// Score one claim and persist the result. Shared by the scheduled
    /// batch and the synchronous submission path, so both enforce the same
    /// evidence merge order, defaults, and history linking.
    pub async fn verify_one(&self, claim: &Claim) -> Result<VerificationOutcome> {
        // History is read before the new row is inserted.
        let prior = self
            .store
            .verifications_for_normalized(&claim.normalized_text, HISTORY_LIMIT)
            .await?;
        let is_duplicate = !prior.is_empty();

        // Internal evidence degrades to empty rather than failing the claim:
        // the external search may still carry the verdict.
        let internal = match self.retriever.retrieve(&claim.text, DEFAULT_TOP_K).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(claim = %claim.id, error = %e, "Internal retrieval failed, continuing without it");
                Vec::new()
            }
        };

        let external = match self.news.search(&claim.text).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(claim = %claim.id, error = %e, "Evidence search failed, continuing without it");
                Vec::new()
            }
        };

        // Merged evidence list: external results first, internal appended.
        let mut evidence: Vec<EvidenceItem> = external
            .into_iter()
            .map(|hit| EvidenceItem {
                title: hit.title,
                text: hit.description.unwrap_or_default(),
                url: hit.url,
                source: hit.source.unwrap_or_else(|| "news".to_string()),
            })
            .collect();
        evidence.extend(internal.into_iter().map(|chunk| EvidenceItem {
            title: chunk.source_title,
            text: chunk.text,
            url: chunk.source_url,
            source: "internal".to_string(),
        }));

        let response = self
            .verdict_model
            .score(&claim.text, &evidence)
            .await
            .context("Verdict scoring failed")?;

        let confidence = response
            .confidence
            .filter(|c| c.is_finite())
            .unwrap_or(0.5)
            .clamp(0.0, 1.0);

        // Quality is a deterministic function of the evidence source
        // domains; an empty evidence list scores the documented floor.
        let evidence_urls: Vec<String> = evidence.iter().map(|e| e.url.clone()).collect();
        let quality = source_quality(&evidence_urls);

        let public_explanation = response
            .public_explanation
            .clone()
            .or_else(|| response.analyst_explanation.clone())
            .unwrap_or_else(|| "No explanation provided".to_string());
        let analyst_explanation = response
            .analyst_explanation
            .or(response.public_explanation)
            .unwrap_or_else(|| "No detailed analysis provided".to_string());
        // The model's cited sources are preferred for display; fall back to
        // the evidence URLs when it cites none.
        let sources = if response.sources.is_empty() {
            evidence_urls.into_iter().take(HISTORY_LIMIT).collect()
        } else {
            response.sources
        };

        let verification = Verification {
            id: Uuid::new_v4(),
            claim_id: claim.id,
            claim_text: claim.text.clone(),
            verdict: response.verdict,
            confidence,
            source_quality: quality,
            public_explanation: public_explanation.clone(),
            analyst_explanation: analyst_explanation.clone(),
            refined_explanation: None,
            sources: sources.clone(),
            scored_at: Utc::now(),
        };
        self.store.insert_verification(&verification).await?;
        self.store.mark_claim_verified(claim.id).await?;

        Ok(VerificationOutcome {
            claim_id: claim.id,
            claim_text: claim.text.clone(),
            verdict: verification.verdict,
            confidence,
            source_quality: quality,
            public_explanation,
            analyst_explanation,
            sources,
            is_duplicate,
            previous_verifications: prior
                .iter()
                .map(|v| PriorVerification {
                    verdict: v.verdict,
                    confidence: v.confidence,
                    scored_at: v.scored_at,
                })
                .collect(),
        })
    }
}
