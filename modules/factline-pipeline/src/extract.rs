use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use factline_common::normalize_claim;
use factline_store::Store;

use crate::traits::ClaimDecomposer;

/// How many pending topics one extraction run takes on.
const EXTRACT_BATCH_SIZE: usize = 5;

#[derive(Debug, Default)]
pub struct ExtractStats {
    pub topics: usize,
    pub claims_created: usize,
    pub duplicate_references: usize,
}

/// Claim extraction stage: decompose each pending topic into atomic claims
/// and resolve each against the store by normalized text. A claim that
/// already exists — under this topic or any other — is a duplicate
/// reference, not a new row; that is what powers recurring-claim history.
pub struct ExtractStage {
    store: Arc<dyn Store>,
    decomposer: Arc<dyn ClaimDecomposer>,
}

impl ExtractStage {
    pub fn new(store: Arc<dyn Store>, decomposer: Arc<dyn ClaimDecomposer>) -> Self {
        Self { store, decomposer }
    }

    pub async fn run(&self) -> Result<ExtractStats> {
        let topics = self
            .store
            .find_topics_pending_extraction(EXTRACT_BATCH_SIZE)
            .await?;
        if topics.is_empty() {
            debug!("No topics pending claim extraction");
            return Ok(ExtractStats::default());
        }

        let mut stats = ExtractStats::default();

        for topic in topics {
            let claims = match self.decomposer.decompose(&topic.title, &topic.summary).await {
                Ok(claims) => claims,
                Err(e) => {
                    // Only this topic is retried; siblings continue.
                    warn!(topic = %topic.id, error = %e, "Claim decomposition failed, topic left for retry");
                    continue;
                }
            };

            for text in claims {
                let normalized = normalize_claim(&text);
                if normalized.is_empty() {
                    continue;
                }

                let (claim, created) = self
                    .store
                    .find_or_create_claim(&text, &normalized, Some(topic.id))
                    .await?;
                if created {
                    stats.claims_created += 1;
                } else {
                    stats.duplicate_references += 1;
                    if claim.topic_id != Some(topic.id) {
                        info!(
                            claim = %claim.id,
                            topic = %topic.id,
                            "Claim already known under another topic, recording duplicate reference"
                        );
                    }
                }
            }

            // Idempotent completion: flipped even when every claim resolved
            // to an existing row.
            self.store.mark_topic_claims_extracted(topic.id).await?;
            stats.topics += 1;
        }

        info!(
            topics = stats.topics,
            claims_created = stats.claims_created,
            duplicate_references = stats.duplicate_references,
            "Claim extraction run complete"
        );
        Ok(stats)
    }
}
