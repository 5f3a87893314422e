use std::collections::HashSet;

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use factline_common::{FactlineError, Topic};
use factline_store::Store;

use crate::traits::{ArticleDigest, TopicClassifier};

/// How many unprocessed units one clustering run takes on.
const CLUSTER_BATCH_SIZE: usize = 20;

#[derive(Debug, Default)]
pub struct ClusterStats {
    pub units: usize,
    pub topics_created: usize,
    pub units_processed: usize,
}

/// Clustering stage: group unprocessed content units into topics via one
/// classification call. A schema-invalid response aborts the whole batch
/// without marking anything processed, so it is retried wholesale; units
/// the classifier leaves out of every cluster simply stay unprocessed.
pub struct ClusterStage {
    store: Arc<dyn Store>,
    classifier: Arc<dyn TopicClassifier>,
}

impl ClusterStage {
    pub fn new(store: Arc<dyn Store>, classifier: Arc<dyn TopicClassifier>) -> Self {
        Self { store, classifier }
    }

    pub async fn run(&self) -> Result<ClusterStats> {
        let units = self.store.find_unprocessed_units(CLUSTER_BATCH_SIZE).await?;
        if units.is_empty() {
            debug!("No unprocessed units to cluster");
            return Ok(ClusterStats::default());
        }

        let mut stats = ClusterStats {
            units: units.len(),
            ..Default::default()
        };

        let digests: Vec<ArticleDigest> = units
            .iter()
            .enumerate()
            .map(|(index, unit)| ArticleDigest {
                index,
                title: unit.title.clone(),
                description: unit.description.clone().unwrap_or_default(),
            })
            .collect();

        let clusters = self
            .classifier
            .classify(&digests)
            .await
            .context("Topic classification failed")?;

        // Validate every index before creating anything, so a malformed
        // response cannot leave a half-written batch behind.
        for cluster in &clusters {
            for &index in &cluster.member_indices {
                if index >= units.len() {
                    return Err(FactlineError::Schema(format!(
                        "member index {index} out of range for batch of {}",
                        units.len()
                    ))
                    .into());
                }
            }
        }

        let mut already_assigned: HashSet<Uuid> = HashSet::new();
        for cluster in clusters {
            let unit_ids: Vec<Uuid> = cluster
                .member_indices
                .iter()
                .map(|&index| units[index].id)
                .collect();
            if unit_ids.is_empty() {
                continue;
            }

            let topic = Topic {
                id: Uuid::new_v4(),
                title: cluster.title,
                summary: cluster.summary,
                category: cluster.category,
                unit_ids: unit_ids.clone(),
                created_at: Utc::now(),
                claims_extracted: false,
            };
            self.store.insert_topic(&topic).await?;
            stats.topics_created += 1;

            // Mark each cluster's members right after its topic lands, so a
            // crash mid-batch loses at most the in-flight cluster.
            let fresh: Vec<Uuid> = unit_ids
                .into_iter()
                .filter(|id| already_assigned.insert(*id))
                .collect();
            if !fresh.is_empty() {
                self.store.mark_units_processed(&fresh).await?;
                stats.units_processed += fresh.len();
            }
        }

        info!(
            units = stats.units,
            topics = stats.topics_created,
            processed = stats.units_processed,
            "Clustering run complete"
        );
        Ok(stats)
    }
}
