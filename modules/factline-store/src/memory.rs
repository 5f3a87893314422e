// In-memory Store: tokio-Mutex'd maps with url and normalized-text
// indexes. Backs the pipeline tests and single-node development runs;
// the semantics (atomicity, ordering, lease reaping) match PgStore.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use factline_common::{Claim, ContentUnit, NewContentUnit, Topic, Verification};

use crate::traits::{Store, LEASE_MAX_HOLD_MINUTES};

#[derive(Default)]
struct Inner {
    units: HashMap<Uuid, ContentUnit>,
    /// Insertion order == fetch order; drives both the unprocessed scan and
    /// the recency window.
    unit_order: Vec<Uuid>,
    url_index: HashMap<String, Uuid>,

    topics: HashMap<Uuid, Topic>,
    topic_order: Vec<Uuid>,

    claims: HashMap<Uuid, Claim>,
    claim_order: Vec<Uuid>,
    normalized_index: HashMap<String, Uuid>,

    verifications: HashMap<Uuid, Verification>,
    verification_order: Vec<Uuid>,

    leases: HashMap<String, DateTime<Utc>>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_unit_if_absent(&self, unit: NewContentUnit) -> Result<(ContentUnit, bool)> {
        let mut inner = self.inner.lock().await;
        if let Some(id) = inner.url_index.get(&unit.url) {
            let existing = inner.units[id].clone();
            return Ok((existing, false));
        }

        let stored = ContentUnit {
            id: Uuid::new_v4(),
            url: unit.url.clone(),
            title: unit.title,
            description: unit.description,
            content: unit.content,
            source_name: unit.source_name,
            published_at: unit.published_at,
            fetched_at: Utc::now(),
            chunks: unit.chunks,
            processed: false,
        };
        inner.url_index.insert(unit.url, stored.id);
        inner.unit_order.push(stored.id);
        inner.units.insert(stored.id, stored.clone());
        Ok((stored, true))
    }

    async fn get_unit_by_url(&self, url: &str) -> Result<Option<ContentUnit>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .url_index
            .get(url)
            .map(|id| inner.units[id].clone()))
    }

    async fn find_unprocessed_units(&self, limit: usize) -> Result<Vec<ContentUnit>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .unit_order
            .iter()
            .filter_map(|id| inner.units.get(id))
            .filter(|u| !u.processed)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_units_processed(&self, ids: &[Uuid]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for id in ids {
            if let Some(unit) = inner.units.get_mut(id) {
                unit.processed = true;
            }
        }
        Ok(())
    }

    async fn recent_units_with_chunks(&self, window: usize) -> Result<Vec<ContentUnit>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .unit_order
            .iter()
            .rev()
            .filter_map(|id| inner.units.get(id))
            .filter(|u| !u.chunks.is_empty())
            .take(window)
            .cloned()
            .collect())
    }

    async fn insert_topic(&self, topic: &Topic) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.topic_order.push(topic.id);
        inner.topics.insert(topic.id, topic.clone());
        Ok(())
    }

    async fn find_topics_pending_extraction(&self, limit: usize) -> Result<Vec<Topic>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .topic_order
            .iter()
            .filter_map(|id| inner.topics.get(id))
            .filter(|t| !t.claims_extracted)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_topic_claims_extracted(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(topic) = inner.topics.get_mut(&id) {
            topic.claims_extracted = true;
        }
        Ok(())
    }

    async fn list_topics(&self, limit: usize) -> Result<Vec<Topic>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .topic_order
            .iter()
            .rev()
            .filter_map(|id| inner.topics.get(id))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn find_or_create_claim(
        &self,
        text: &str,
        normalized: &str,
        topic_id: Option<Uuid>,
    ) -> Result<(Claim, bool)> {
        let mut inner = self.inner.lock().await;
        if let Some(id) = inner.normalized_index.get(normalized) {
            let existing = inner.claims[id].clone();
            return Ok((existing, false));
        }

        let claim = Claim {
            id: Uuid::new_v4(),
            topic_id,
            text: text.to_string(),
            normalized_text: normalized.to_string(),
            created_at: Utc::now(),
            verified: false,
        };
        inner
            .normalized_index
            .insert(normalized.to_string(), claim.id);
        inner.claim_order.push(claim.id);
        inner.claims.insert(claim.id, claim.clone());
        Ok((claim, true))
    }

    async fn find_unverified_claims(&self, limit: usize) -> Result<Vec<Claim>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .claim_order
            .iter()
            .filter_map(|id| inner.claims.get(id))
            .filter(|c| !c.verified)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn mark_claim_verified(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(claim) = inner.claims.get_mut(&id) {
            claim.verified = true;
        }
        Ok(())
    }

    async fn claims_for_topic(&self, topic_id: Uuid) -> Result<Vec<Claim>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .claim_order
            .iter()
            .filter_map(|id| inner.claims.get(id))
            .filter(|c| c.topic_id == Some(topic_id))
            .cloned()
            .collect())
    }

    async fn insert_verification(&self, verification: &Verification) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.verification_order.push(verification.id);
        inner
            .verifications
            .insert(verification.id, verification.clone());
        Ok(())
    }

    async fn verifications_for_claim(&self, claim_id: Uuid) -> Result<Vec<Verification>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<Verification> = inner
            .verifications
            .values()
            .filter(|v| v.claim_id == claim_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.scored_at.cmp(&a.scored_at));
        Ok(rows)
    }

    async fn verifications_for_normalized(
        &self,
        normalized: &str,
        limit: usize,
    ) -> Result<Vec<Verification>> {
        let inner = self.inner.lock().await;
        // Scan claims rather than the index: legacy stores may hold several
        // claim rows with the same normalized text.
        let claim_ids: Vec<Uuid> = inner
            .claims
            .values()
            .filter(|c| c.normalized_text == normalized)
            .map(|c| c.id)
            .collect();
        let mut rows: Vec<Verification> = inner
            .verifications
            .values()
            .filter(|v| claim_ids.contains(&v.claim_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.scored_at.cmp(&a.scored_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn unrefined_verifications(&self, limit: usize) -> Result<Vec<Verification>> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<Verification> = inner
            .verifications
            .values()
            .filter(|v| v.refined_explanation.is_none())
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.scored_at.cmp(&a.scored_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn set_refined_explanation(&self, verification_id: Uuid, refined: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(v) = inner.verifications.get_mut(&verification_id) {
            v.refined_explanation = Some(refined.to_string());
        }
        Ok(())
    }

    async fn try_acquire_lease(&self, stage: &str, now: DateTime<Utc>) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        if let Some(acquired_at) = inner.leases.get(stage) {
            if now - *acquired_at < Duration::minutes(LEASE_MAX_HOLD_MINUTES) {
                return Ok(false);
            }
            // Stale lease from a crashed run — reap and take over.
        }
        inner.leases.insert(stage.to_string(), now);
        Ok(true)
    }

    async fn release_lease(&self, stage: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.leases.remove(stage);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use factline_common::{Category, Chunk, Verdict};

    fn new_unit(url: &str, title: &str) -> NewContentUnit {
        NewContentUnit {
            url: url.to_string(),
            title: title.to_string(),
            description: None,
            content: None,
            source_name: None,
            published_at: None,
            chunks: vec![Chunk {
                text: "chunk".to_string(),
                embedding: vec![1.0, 0.0],
            }],
        }
    }

    fn new_verification(claim_id: Uuid, scored_at: DateTime<Utc>) -> Verification {
        Verification {
            id: Uuid::new_v4(),
            claim_id,
            claim_text: "claim".to_string(),
            verdict: Verdict::True,
            confidence: 0.8,
            source_quality: 0.9,
            public_explanation: "public".to_string(),
            analyst_explanation: "analyst".to_string(),
            refined_explanation: None,
            sources: vec![],
            scored_at,
        }
    }

    #[tokio::test]
    async fn duplicate_url_keeps_first_title() {
        let store = MemoryStore::new();
        let (first, created) = store
            .upsert_unit_if_absent(new_unit("https://example.com/a", "First"))
            .await
            .unwrap();
        assert!(created);

        let (second, created) = store
            .upsert_unit_if_absent(new_unit("https://example.com/a", "Second"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.title, "First");

        let unprocessed = store.find_unprocessed_units(10).await.unwrap();
        assert_eq!(unprocessed.len(), 1);
    }

    #[tokio::test]
    async fn processed_units_leave_the_unprocessed_set() {
        let store = MemoryStore::new();
        let (a, _) = store
            .upsert_unit_if_absent(new_unit("https://example.com/a", "A"))
            .await
            .unwrap();
        store
            .upsert_unit_if_absent(new_unit("https://example.com/b", "B"))
            .await
            .unwrap();

        store.mark_units_processed(&[a.id]).await.unwrap();
        let remaining = store.find_unprocessed_units(10).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].title, "B");
    }

    #[tokio::test]
    async fn recency_window_is_newest_first_and_bounded() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .upsert_unit_if_absent(new_unit(&format!("https://example.com/{i}"), "t"))
                .await
                .unwrap();
        }
        let window = store.recent_units_with_chunks(3).await.unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window[0].url, "https://example.com/4");
        assert_eq!(window[2].url, "https://example.com/2");
    }

    #[tokio::test]
    async fn find_or_create_claim_dedupes_on_normalized_text() {
        let store = MemoryStore::new();
        let topic_a = Uuid::new_v4();
        let topic_b = Uuid::new_v4();

        let (claim, created) = store
            .find_or_create_claim("The sky is Blue.", "the sky is blue", Some(topic_a))
            .await
            .unwrap();
        assert!(created);

        let (dup, created) = store
            .find_or_create_claim("the sky is blue", "the sky is blue", Some(topic_b))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(dup.id, claim.id);
        // Duplicate reference: the row keeps its original topic.
        assert_eq!(dup.topic_id, Some(topic_a));

        assert_eq!(store.claims_for_topic(topic_a).await.unwrap().len(), 1);
        assert!(store.claims_for_topic(topic_b).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn verification_history_spans_claim_rows_and_orders_newest_first() {
        let store = MemoryStore::new();
        let (claim, _) = store
            .find_or_create_claim("x", "x", None)
            .await
            .unwrap();

        let now = Utc::now();
        for minutes in [30, 10, 20] {
            store
                .insert_verification(&new_verification(
                    claim.id,
                    now - Duration::minutes(minutes),
                ))
                .await
                .unwrap();
        }

        let history = store.verifications_for_normalized("x", 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].scored_at > history[1].scored_at);
    }

    #[tokio::test]
    async fn refinement_writes_only_the_derived_field() {
        let store = MemoryStore::new();
        let (claim, _) = store.find_or_create_claim("x", "x", None).await.unwrap();
        let v = new_verification(claim.id, Utc::now());
        store.insert_verification(&v).await.unwrap();

        assert_eq!(store.unrefined_verifications(10).await.unwrap().len(), 1);
        store
            .set_refined_explanation(v.id, "shorter")
            .await
            .unwrap();

        assert!(store.unrefined_verifications(10).await.unwrap().is_empty());
        let stored = &store.verifications_for_claim(claim.id).await.unwrap()[0];
        assert_eq!(stored.analyst_explanation, "analyst");
        assert_eq!(stored.refined_explanation.as_deref(), Some("shorter"));
    }

    #[tokio::test]
    async fn lease_is_exclusive_until_released() {
        let store = MemoryStore::new();
        let now = Utc::now();
        assert!(store.try_acquire_lease("verify", now).await.unwrap());
        assert!(!store.try_acquire_lease("verify", now).await.unwrap());
        // Other stages are unaffected.
        assert!(store.try_acquire_lease("ingest", now).await.unwrap());

        store.release_lease("verify").await.unwrap();
        assert!(store.try_acquire_lease("verify", now).await.unwrap());
    }

    #[tokio::test]
    async fn stale_lease_is_reaped_on_acquisition() {
        let store = MemoryStore::new();
        let start = Utc::now();
        assert!(store.try_acquire_lease("cluster", start).await.unwrap());

        let later = start + Duration::minutes(LEASE_MAX_HOLD_MINUTES + 1);
        assert!(store.try_acquire_lease("cluster", later).await.unwrap());
    }

    #[tokio::test]
    async fn topics_pending_extraction_excludes_flagged() {
        let store = MemoryStore::new();
        let topic = Topic {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            summary: "s".to_string(),
            category: Category::General,
            unit_ids: vec![],
            created_at: Utc::now(),
            claims_extracted: false,
        };
        store.insert_topic(&topic).await.unwrap();

        assert_eq!(
            store.find_topics_pending_extraction(10).await.unwrap().len(),
            1
        );
        store.mark_topic_claims_extracted(topic.id).await.unwrap();
        assert!(store
            .find_topics_pending_extraction(10)
            .await
            .unwrap()
            .is_empty());
    }
}
