// Postgres Store. Uniqueness invariants live in the schema (UNIQUE on
// content_units.url and claims.normalized_text); upserts go through
// ON CONFLICT DO NOTHING so a losing writer observes the winner's row
// instead of an error.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use factline_common::{
    Category, Chunk, Claim, ContentUnit, NewContentUnit, Topic, Verdict, Verification,
};

use crate::traits::{Store, LEASE_MAX_HOLD_MINUTES};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_unit_by_url(&self, url: &str) -> Result<Option<ContentUnit>> {
        let row = sqlx::query("SELECT * FROM content_units WHERE url = $1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch content unit by url")?;
        row.map(|r| unit_from_row(&r)).transpose()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_unit_if_absent(&self, unit: NewContentUnit) -> Result<(ContentUnit, bool)> {
        let chunks =
            serde_json::to_value(&unit.chunks).context("Failed to serialize chunks")?;

        let result = sqlx::query(
            "INSERT INTO content_units
                (id, url, title, description, content, source_name, published_at,
                 fetched_at, chunks, processed)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, FALSE)
             ON CONFLICT (url) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(&unit.url)
        .bind(&unit.title)
        .bind(&unit.description)
        .bind(&unit.content)
        .bind(&unit.source_name)
        .bind(unit.published_at)
        .bind(Utc::now())
        .bind(chunks)
        .execute(&self.pool)
        .await
        .context("Failed to upsert content unit")?;

        let created = result.rows_affected() == 1;
        let stored = self
            .fetch_unit_by_url(&unit.url)
            .await?
            .context("Content unit missing after upsert")?;
        Ok((stored, created))
    }

    async fn get_unit_by_url(&self, url: &str) -> Result<Option<ContentUnit>> {
        self.fetch_unit_by_url(url).await
    }

    async fn find_unprocessed_units(&self, limit: usize) -> Result<Vec<ContentUnit>> {
        let rows = sqlx::query(
            "SELECT * FROM content_units WHERE NOT processed ORDER BY fetched_at ASC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to select unprocessed units")?;
        rows.iter().map(unit_from_row).collect()
    }

    async fn mark_units_processed(&self, ids: &[Uuid]) -> Result<()> {
        sqlx::query("UPDATE content_units SET processed = TRUE WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await
            .context("Failed to mark units processed")?;
        Ok(())
    }

    async fn recent_units_with_chunks(&self, window: usize) -> Result<Vec<ContentUnit>> {
        let rows = sqlx::query(
            "SELECT * FROM content_units
             WHERE jsonb_array_length(chunks) > 0
             ORDER BY fetched_at DESC LIMIT $1",
        )
        .bind(window as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to select retrieval window")?;
        rows.iter().map(unit_from_row).collect()
    }

    async fn insert_topic(&self, topic: &Topic) -> Result<()> {
        sqlx::query(
            "INSERT INTO topics
                (id, title, summary, category, unit_ids, created_at, claims_extracted)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(topic.id)
        .bind(&topic.title)
        .bind(&topic.summary)
        .bind(topic.category.to_string())
        .bind(&topic.unit_ids)
        .bind(topic.created_at)
        .bind(topic.claims_extracted)
        .execute(&self.pool)
        .await
        .context("Failed to insert topic")?;
        Ok(())
    }

    async fn find_topics_pending_extraction(&self, limit: usize) -> Result<Vec<Topic>> {
        let rows = sqlx::query(
            "SELECT * FROM topics WHERE NOT claims_extracted ORDER BY created_at ASC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to select pending topics")?;
        rows.iter().map(topic_from_row).collect()
    }

    async fn mark_topic_claims_extracted(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE topics SET claims_extracted = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to flag topic extraction")?;
        Ok(())
    }

    async fn list_topics(&self, limit: usize) -> Result<Vec<Topic>> {
        let rows = sqlx::query("SELECT * FROM topics ORDER BY created_at DESC LIMIT $1")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list topics")?;
        rows.iter().map(topic_from_row).collect()
    }

    async fn find_or_create_claim(
        &self,
        text: &str,
        normalized: &str,
        topic_id: Option<Uuid>,
    ) -> Result<(Claim, bool)> {
        let result = sqlx::query(
            "INSERT INTO claims (id, topic_id, text, normalized_text, created_at, verified)
             VALUES ($1, $2, $3, $4, $5, FALSE)
             ON CONFLICT (normalized_text) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(topic_id)
        .bind(text)
        .bind(normalized)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to upsert claim")?;

        let created = result.rows_affected() == 1;
        let row = sqlx::query("SELECT * FROM claims WHERE normalized_text = $1")
            .bind(normalized)
            .fetch_one(&self.pool)
            .await
            .context("Claim missing after upsert")?;
        Ok((claim_from_row(&row)?, created))
    }

    async fn find_unverified_claims(&self, limit: usize) -> Result<Vec<Claim>> {
        let rows =
            sqlx::query("SELECT * FROM claims WHERE NOT verified ORDER BY created_at ASC LIMIT $1")
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await
                .context("Failed to select unverified claims")?;
        rows.iter().map(claim_from_row).collect()
    }

    async fn mark_claim_verified(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE claims SET verified = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to mark claim verified")?;
        Ok(())
    }

    async fn claims_for_topic(&self, topic_id: Uuid) -> Result<Vec<Claim>> {
        let rows = sqlx::query("SELECT * FROM claims WHERE topic_id = $1 ORDER BY created_at ASC")
            .bind(topic_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to select claims for topic")?;
        rows.iter().map(claim_from_row).collect()
    }

    async fn insert_verification(&self, verification: &Verification) -> Result<()> {
        let sources = serde_json::to_value(&verification.sources)
            .context("Failed to serialize sources")?;
        sqlx::query(
            "INSERT INTO verifications
                (id, claim_id, claim_text, verdict, confidence, source_quality,
                 public_explanation, analyst_explanation, refined_explanation,
                 sources, scored_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(verification.id)
        .bind(verification.claim_id)
        .bind(&verification.claim_text)
        .bind(verification.verdict.to_string())
        .bind(verification.confidence)
        .bind(verification.source_quality)
        .bind(&verification.public_explanation)
        .bind(&verification.analyst_explanation)
        .bind(&verification.refined_explanation)
        .bind(sources)
        .bind(verification.scored_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert verification")?;
        Ok(())
    }

    async fn verifications_for_claim(&self, claim_id: Uuid) -> Result<Vec<Verification>> {
        let rows = sqlx::query(
            "SELECT * FROM verifications WHERE claim_id = $1 ORDER BY scored_at DESC",
        )
        .bind(claim_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to select verifications for claim")?;
        rows.iter().map(verification_from_row).collect()
    }

    async fn verifications_for_normalized(
        &self,
        normalized: &str,
        limit: usize,
    ) -> Result<Vec<Verification>> {
        let rows = sqlx::query(
            "SELECT v.* FROM verifications v
             JOIN claims c ON v.claim_id = c.id
             WHERE c.normalized_text = $1
             ORDER BY v.scored_at DESC LIMIT $2",
        )
        .bind(normalized)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to select verification history")?;
        rows.iter().map(verification_from_row).collect()
    }

    async fn unrefined_verifications(&self, limit: usize) -> Result<Vec<Verification>> {
        let rows = sqlx::query(
            "SELECT * FROM verifications
             WHERE refined_explanation IS NULL
             ORDER BY scored_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to select unrefined verifications")?;
        rows.iter().map(verification_from_row).collect()
    }

    async fn set_refined_explanation(&self, verification_id: Uuid, refined: &str) -> Result<()> {
        sqlx::query("UPDATE verifications SET refined_explanation = $2 WHERE id = $1")
            .bind(verification_id)
            .bind(refined)
            .execute(&self.pool)
            .await
            .context("Failed to store refined explanation")?;
        Ok(())
    }

    async fn try_acquire_lease(&self, stage: &str, now: DateTime<Utc>) -> Result<bool> {
        // Reap a stale lease from a crashed run, then atomically claim.
        let cutoff = now - Duration::minutes(LEASE_MAX_HOLD_MINUTES);
        sqlx::query("DELETE FROM stage_leases WHERE stage = $1 AND acquired_at < $2")
            .bind(stage)
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("Failed to reap stale lease")?;

        let result = sqlx::query(
            "INSERT INTO stage_leases (stage, acquired_at) VALUES ($1, $2)
             ON CONFLICT (stage) DO NOTHING",
        )
        .bind(stage)
        .bind(now)
        .execute(&self.pool)
        .await
        .context("Failed to acquire stage lease")?;

        Ok(result.rows_affected() == 1)
    }

    async fn release_lease(&self, stage: &str) -> Result<()> {
        sqlx::query("DELETE FROM stage_leases WHERE stage = $1")
            .bind(stage)
            .execute(&self.pool)
            .await
            .context("Failed to release stage lease")?;
        Ok(())
    }
}

// --- Row mapping ---

fn unit_from_row(row: &PgRow) -> Result<ContentUnit> {
    let chunks: serde_json::Value = row.try_get("chunks")?;
    let chunks: Vec<Chunk> =
        serde_json::from_value(chunks).context("Stored chunks are malformed")?;
    Ok(ContentUnit {
        id: row.try_get("id")?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        content: row.try_get("content")?,
        source_name: row.try_get("source_name")?,
        published_at: row.try_get("published_at")?,
        fetched_at: row.try_get("fetched_at")?,
        chunks,
        processed: row.try_get("processed")?,
    })
}

fn topic_from_row(row: &PgRow) -> Result<Topic> {
    let category: String = row.try_get("category")?;
    Ok(Topic {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        summary: row.try_get("summary")?,
        category: Category::parse_lenient(&category),
        unit_ids: row.try_get("unit_ids")?,
        created_at: row.try_get("created_at")?,
        claims_extracted: row.try_get("claims_extracted")?,
    })
}

fn claim_from_row(row: &PgRow) -> Result<Claim> {
    Ok(Claim {
        id: row.try_get("id")?,
        topic_id: row.try_get("topic_id")?,
        text: row.try_get("text")?,
        normalized_text: row.try_get("normalized_text")?,
        created_at: row.try_get("created_at")?,
        verified: row.try_get("verified")?,
    })
}

fn verification_from_row(row: &PgRow) -> Result<Verification> {
    let verdict: String = row.try_get("verdict")?;
    let sources: serde_json::Value = row.try_get("sources")?;
    let sources: Vec<String> =
        serde_json::from_value(sources).context("Stored sources are malformed")?;
    Ok(Verification {
        id: row.try_get("id")?,
        claim_id: row.try_get("claim_id")?,
        claim_text: row.try_get("claim_text")?,
        verdict: Verdict::parse_lenient(&verdict),
        confidence: row.try_get("confidence")?,
        source_quality: row.try_get("source_quality")?,
        public_explanation: row.try_get("public_explanation")?,
        analyst_explanation: row.try_get("analyst_explanation")?,
        refined_explanation: row.try_get("refined_explanation")?,
        sources,
        scored_at: row.try_get("scored_at")?,
    })
}
