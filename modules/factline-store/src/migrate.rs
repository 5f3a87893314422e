use anyhow::{Context, Result};
use sqlx::PgPool;
use tracing::info;

/// Idempotent schema setup. Safe to run on every startup.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS content_units (
            id UUID PRIMARY KEY,
            url TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT,
            content TEXT,
            source_name TEXT,
            published_at TIMESTAMPTZ,
            fetched_at TIMESTAMPTZ NOT NULL,
            chunks JSONB NOT NULL DEFAULT '[]'::jsonb,
            processed BOOLEAN NOT NULL DEFAULT FALSE
        )",
        "CREATE INDEX IF NOT EXISTS idx_content_units_unprocessed
            ON content_units (fetched_at) WHERE NOT processed",
        "CREATE INDEX IF NOT EXISTS idx_content_units_fetched
            ON content_units (fetched_at DESC)",
        "CREATE TABLE IF NOT EXISTS topics (
            id UUID PRIMARY KEY,
            title TEXT NOT NULL,
            summary TEXT NOT NULL,
            category TEXT NOT NULL,
            unit_ids UUID[] NOT NULL DEFAULT '{}',
            created_at TIMESTAMPTZ NOT NULL,
            claims_extracted BOOLEAN NOT NULL DEFAULT FALSE
        )",
        "CREATE TABLE IF NOT EXISTS claims (
            id UUID PRIMARY KEY,
            topic_id UUID REFERENCES topics(id),
            text TEXT NOT NULL,
            normalized_text TEXT NOT NULL UNIQUE,
            created_at TIMESTAMPTZ NOT NULL,
            verified BOOLEAN NOT NULL DEFAULT FALSE
        )",
        "CREATE TABLE IF NOT EXISTS verifications (
            id UUID PRIMARY KEY,
            claim_id UUID NOT NULL REFERENCES claims(id),
            claim_text TEXT NOT NULL,
            verdict TEXT NOT NULL,
            confidence DOUBLE PRECISION NOT NULL,
            source_quality DOUBLE PRECISION NOT NULL,
            public_explanation TEXT NOT NULL,
            analyst_explanation TEXT NOT NULL,
            refined_explanation TEXT,
            sources JSONB NOT NULL DEFAULT '[]'::jsonb,
            scored_at TIMESTAMPTZ NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_verifications_claim
            ON verifications (claim_id, scored_at DESC)",
        "CREATE TABLE IF NOT EXISTS stage_leases (
            stage TEXT PRIMARY KEY,
            acquired_at TIMESTAMPTZ NOT NULL
        )",
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Migration statement failed")?;
    }

    info!("Store migrations applied");
    Ok(())
}
