// Store trait for the fact pipeline.
//
// All durable state sits behind this one boundary: content units, topics,
// claims, verifications, and the stage leases that keep timer-triggered
// runs from overlapping. Two implementations: MemoryStore (tests,
// single-node dev) and PgStore (production).

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use factline_common::{Claim, ContentUnit, NewContentUnit, Topic, Verification};

/// A lease held longer than this is considered abandoned (crashed process)
/// and may be reaped by the next acquisition attempt.
pub const LEASE_MAX_HOLD_MINUTES: i64 = 30;

#[async_trait]
pub trait Store: Send + Sync {
    // --- Content units ---

    /// Atomic check-then-insert keyed on `url`. Returns the stored unit and
    /// whether this call created it. Concurrent ingestion of the same URL
    /// yields exactly one row; the loser observes `created = false` and the
    /// originally stored fields.
    async fn upsert_unit_if_absent(&self, unit: NewContentUnit) -> Result<(ContentUnit, bool)>;

    async fn get_unit_by_url(&self, url: &str) -> Result<Option<ContentUnit>>;

    /// Units not yet claimed by the clustering stage, oldest first.
    async fn find_unprocessed_units(&self, limit: usize) -> Result<Vec<ContentUnit>>;

    async fn mark_units_processed(&self, ids: &[Uuid]) -> Result<()>;

    /// The retrieval window: most recently fetched units that carry at
    /// least one chunk, newest first.
    async fn recent_units_with_chunks(&self, window: usize) -> Result<Vec<ContentUnit>>;

    // --- Topics ---

    async fn insert_topic(&self, topic: &Topic) -> Result<()>;

    /// Topics whose claims have not been extracted yet, oldest first.
    async fn find_topics_pending_extraction(&self, limit: usize) -> Result<Vec<Topic>>;

    async fn mark_topic_claims_extracted(&self, id: Uuid) -> Result<()>;

    async fn list_topics(&self, limit: usize) -> Result<Vec<Topic>>;

    // --- Claims ---

    /// Atomic find-or-create keyed on `normalized_text`. An existing claim
    /// is returned unmodified even when `topic_id` differs — that is the
    /// duplicate-reference policy, not an update.
    async fn find_or_create_claim(
        &self,
        text: &str,
        normalized: &str,
        topic_id: Option<Uuid>,
    ) -> Result<(Claim, bool)>;

    async fn find_unverified_claims(&self, limit: usize) -> Result<Vec<Claim>>;

    async fn mark_claim_verified(&self, id: Uuid) -> Result<()>;

    async fn claims_for_topic(&self, topic_id: Uuid) -> Result<Vec<Claim>>;

    // --- Verifications (append-only) ---

    async fn insert_verification(&self, verification: &Verification) -> Result<()>;

    async fn verifications_for_claim(&self, claim_id: Uuid) -> Result<Vec<Verification>>;

    /// Verification history across every claim row sharing this normalized
    /// text (claims created before dedup existed may duplicate rows),
    /// newest first.
    async fn verifications_for_normalized(
        &self,
        normalized: &str,
        limit: usize,
    ) -> Result<Vec<Verification>>;

    /// Verifications the refinement stage has not rewritten yet, newest
    /// first.
    async fn unrefined_verifications(&self, limit: usize) -> Result<Vec<Verification>>;

    /// Write the derived refinement field. The original explanations are
    /// never touched.
    async fn set_refined_explanation(&self, verification_id: Uuid, refined: &str) -> Result<()>;

    // --- Stage leases ---

    /// Atomically acquire the named stage lease. Returns false if another
    /// run holds it. A stale lease (held past `LEASE_MAX_HOLD_MINUTES`) is
    /// reaped first, so a crashed run cannot wedge a stage forever.
    async fn try_acquire_lease(&self, stage: &str, now: DateTime<Utc>) -> Result<bool>;

    async fn release_lease(&self, stage: &str) -> Result<()>;
}
