use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use factline_common::{normalize_claim, FactlineError};
use factline_store::Store;

use crate::traits::ClaimDecomposer;
use crate::verify::{VerificationOutcome, VerifyStage};

/// Synchronous user-facing verification path. Shares claim identity
/// (normalized-text find-or-create) and per-claim scoring with the
/// scheduled pipeline, so a user submission and a scheduled run can never
/// disagree about which claim a text resolves to.
pub struct ClaimSubmitter {
    store: Arc<dyn Store>,
    decomposer: Arc<dyn ClaimDecomposer>,
    verify: Arc<VerifyStage>,
}

impl ClaimSubmitter {
    pub fn new(
        store: Arc<dyn Store>,
        decomposer: Arc<dyn ClaimDecomposer>,
        verify: Arc<VerifyStage>,
    ) -> Self {
        Self {
            store,
            decomposer,
            verify,
        }
    }

    /// Verify free text submitted by a user. Failures surface as a single
    /// error result; nothing is marked verified on the failure path.
    pub async fn submit_claim(&self, text: &str) -> Result<VerificationOutcome> {
        if text.trim().is_empty() {
            return Err(FactlineError::Validation("text is required".to_string()).into());
        }

        let claim_text = self
            .decomposer
            .extract_core_claim(text)
            .await
            .context("Failed to extract core claim")?;
        let normalized = normalize_claim(&claim_text);
        if normalized.is_empty() {
            return Err(
                FactlineError::Validation("no verifiable claim found in input".to_string()).into(),
            );
        }

        // Ad-hoc claims carry no topic; if scheduled extraction later
        // produces the same normalized text it resolves to this row.
        let (claim, created) = self
            .store
            .find_or_create_claim(&claim_text, &normalized, None)
            .await?;
        if !created {
            info!(claim = %claim.id, "Submission matched an existing claim");
        }

        self.verify.verify_one(&claim).await
    }
}
