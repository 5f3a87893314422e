use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use factline_store::Store;

use crate::traits::ExplanationRefiner;

/// How many verifications one refinement run rewrites.
const REFINE_BATCH_SIZE: usize = 5;

#[derive(Debug, Default)]
pub struct RefineStats {
    pub refined: usize,
    pub failed: usize,
}

/// Explanation refinement stage. Verification history is append-only, so
/// the rewrite lands in the derived `refined_explanation` field and the
/// original analyst explanation stays untouched. Selecting only rows
/// without a refinement makes the stage idempotent.
pub struct RefineStage {
    store: Arc<dyn Store>,
    refiner: Arc<dyn ExplanationRefiner>,
}

impl RefineStage {
    pub fn new(store: Arc<dyn Store>, refiner: Arc<dyn ExplanationRefiner>) -> Self {
        Self { store, refiner }
    }

    pub async fn run(&self) -> Result<RefineStats> {
        let pending = self.store.unrefined_verifications(REFINE_BATCH_SIZE).await?;
        if pending.is_empty() {
            debug!("No verifications awaiting refinement");
            return Ok(RefineStats::default());
        }

        let mut stats = RefineStats::default();

        for verification in pending {
            match self.refiner.refine(&verification.analyst_explanation).await {
                Ok(refined) => {
                    self.store
                        .set_refined_explanation(verification.id, &refined)
                        .await?;
                    stats.refined += 1;
                }
                Err(e) => {
                    stats.failed += 1;
                    warn!(verification = %verification.id, error = %e, "Explanation refinement failed");
                }
            }
        }

        info!(
            refined = stats.refined,
            failed = stats.failed,
            "Refinement run complete"
        );
        Ok(stats)
    }
}
