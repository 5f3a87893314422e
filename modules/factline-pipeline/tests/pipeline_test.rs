// End-to-end pipeline scenarios against MemoryStore and the trait mocks:
// ingestion → clustering → claim extraction → verification, plus the
// synchronous submission path and the refinement stage.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use factline_common::{Category, SearchHit, Topic};
use factline_pipeline::cluster::ClusterStage;
use factline_pipeline::extract::ExtractStage;
use factline_pipeline::ingest::IngestStage;
use factline_pipeline::refine::RefineStage;
use factline_pipeline::retrieval::Retriever;
use factline_pipeline::submit::ClaimSubmitter;
use factline_pipeline::testing::{
    article, FixedEmbedder, MockClassifier, MockDecomposer, MockNewsFetcher, MockRefiner,
    MockVerdictModel,
};
use factline_pipeline::traits::TopicCluster;
use factline_pipeline::verify::VerifyStage;
use factline_store::{MemoryStore, Store};

fn topic(title: &str) -> Topic {
    Topic {
        id: Uuid::new_v4(),
        title: title.to_string(),
        summary: format!("{title} summary."),
        category: Category::General,
        unit_ids: vec![],
        created_at: Utc::now(),
        claims_extracted: false,
    }
}

fn reuters_hit() -> SearchHit {
    SearchHit {
        title: "Wire report".to_string(),
        description: Some("Independent coverage of the event.".to_string()),
        url: "https://reuters.com/article/1".to_string(),
        source: Some("Reuters".to_string()),
    }
}

fn verify_stage(
    store: Arc<MemoryStore>,
    news: Arc<MockNewsFetcher>,
    verdict: Arc<MockVerdictModel>,
) -> VerifyStage {
    let retriever = Retriever::new(store.clone(), Arc::new(FixedEmbedder::new()));
    VerifyStage::new(store, retriever, news, verdict)
}

#[tokio::test]
async fn pipeline_moves_articles_to_verified_claims() {
    let store = Arc::new(MemoryStore::new());

    // Ingest three headlines.
    let news = Arc::new(
        MockNewsFetcher::new()
            .with_headlines(vec![
                article("https://n.example/1", "Storm makes landfall", "A storm hit the coast."),
                article("https://n.example/2", "Storm damage grows", "Damage is spreading."),
                article("https://n.example/3", "Rates unchanged", "The bank held rates."),
            ])
            .with_default_search(vec![reuters_hit()]),
    );
    let ingest = IngestStage::new(store.clone(), news.clone(), Arc::new(FixedEmbedder::new()));
    let stats = ingest.run().await.unwrap();
    assert_eq!(stats.stored, 3);

    // Cluster: one storm topic over articles 0 and 1; article 2 is omitted
    // and must stay unprocessed for a later run.
    let classifier = Arc::new(MockClassifier::Clusters(vec![TopicCluster {
        title: "Coastal storm".to_string(),
        summary: "A storm made landfall. Damage is growing.".to_string(),
        category: Category::Disaster,
        member_indices: vec![0, 1],
    }]));
    let cluster = ClusterStage::new(store.clone(), classifier);
    let stats = cluster.run().await.unwrap();
    assert_eq!(stats.topics_created, 1);
    assert_eq!(stats.units_processed, 2);
    assert_eq!(store.find_unprocessed_units(10).await.unwrap().len(), 1);

    let topics = store.list_topics(10).await.unwrap();
    assert_eq!(topics.len(), 1);
    let storm = &topics[0];
    assert_eq!(storm.unit_ids.len(), 2);

    // Extract two claims from the storm topic.
    let decomposer = Arc::new(MockDecomposer::new().on_topic(
        "Coastal storm",
        &["The storm made landfall on Tuesday.", "Two towns lost power."],
    ));
    let extract = ExtractStage::new(store.clone(), decomposer);
    let stats = extract.run().await.unwrap();
    assert_eq!(stats.claims_created, 2);
    assert!(store.list_topics(10).await.unwrap()[0].claims_extracted);

    // Verify both claims.
    let verdict = Arc::new(MockVerdictModel::affirm(Some(0.9)));
    let verify = verify_stage(store.clone(), news, verdict.clone());
    let stats = verify.run().await.unwrap();
    assert_eq!(stats.verified, 2);
    assert_eq!(stats.failed, 0);
    assert!(store.find_unverified_claims(10).await.unwrap().is_empty());

    // The model saw merged evidence: external search hit plus internal chunks.
    for (_, evidence_len) in verdict.calls() {
        assert!(evidence_len > 1, "expected external + internal evidence");
    }

    let claims = store.claims_for_topic(storm.id).await.unwrap();
    assert_eq!(claims.len(), 2);
    for claim in &claims {
        let history = store.verifications_for_claim(claim.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert!((history[0].confidence - 0.9).abs() < 1e-9);
        assert!(history[0].source_quality > 0.0 && history[0].source_quality <= 1.0);
    }
}

#[tokio::test]
async fn duplicate_url_is_ingested_once_keeping_first_title() {
    let store = Arc::new(MemoryStore::new());
    let news = Arc::new(MockNewsFetcher::new().with_headlines(vec![
        article("https://n.example/same", "First title", "Original."),
        article("https://n.example/same", "Second title", "Republished."),
    ]));
    let ingest = IngestStage::new(store.clone(), news, Arc::new(FixedEmbedder::new()));

    let stats = ingest.run().await.unwrap();
    assert_eq!(stats.stored, 1);
    assert_eq!(stats.duplicates, 1);

    let unit = store
        .get_unit_by_url("https://n.example/same")
        .await
        .unwrap()
        .expect("unit stored");
    assert_eq!(unit.title, "First title");
}

#[tokio::test]
async fn failed_chunk_embedding_drops_only_that_chunk() {
    let store = Arc::new(MemoryStore::new());
    // A ~480-char first sentence forces the marked sentence into its own
    // chunk, so only that chunk is dropped.
    let long_sentence = format!("{}.", "word ".repeat(96).trim_end());
    let mut a = article("https://n.example/partial", "T", "ignored");
    a.description = Some(long_sentence);
    a.content = Some("FAILME data point.".to_string());
    let news = Arc::new(MockNewsFetcher::new().with_headlines(vec![a]));
    let ingest = IngestStage::new(
        store.clone(),
        news,
        Arc::new(FixedEmbedder::new().fail_on("FAILME")),
    );

    let stats = ingest.run().await.unwrap();
    assert_eq!(stats.stored, 1);
    assert_eq!(stats.chunks_dropped, 1);

    let unit = store
        .get_unit_by_url("https://n.example/partial")
        .await
        .unwrap()
        .expect("unit stored despite dropped chunk");
    assert_eq!(unit.chunks.len(), 1);
    assert!(!unit.chunks[0].text.contains("FAILME"));
}

#[tokio::test]
async fn malformed_classification_aborts_the_whole_batch() {
    let store = Arc::new(MemoryStore::new());
    let news = Arc::new(MockNewsFetcher::new().with_headlines(vec![
        article("https://n.example/1", "One", "First."),
        article("https://n.example/2", "Two", "Second."),
    ]));
    IngestStage::new(store.clone(), news, Arc::new(FixedEmbedder::new()))
        .run()
        .await
        .unwrap();

    // Member index out of range for a batch of two.
    let classifier = Arc::new(MockClassifier::Clusters(vec![TopicCluster {
        title: "Bad".to_string(),
        summary: "Bad.".to_string(),
        category: Category::General,
        member_indices: vec![5],
    }]));
    let result = ClusterStage::new(store.clone(), classifier).run().await;
    assert!(result.is_err());
    assert!(store.list_topics(10).await.unwrap().is_empty());
    assert_eq!(
        store.find_unprocessed_units(10).await.unwrap().len(),
        2,
        "nothing may be marked processed on a schema violation"
    );

    // A schema-invalid payload behaves the same way.
    let classifier = Arc::new(MockClassifier::SchemaFailure("not json".to_string()));
    let result = ClusterStage::new(store.clone(), classifier).run().await;
    assert!(result.is_err());
    assert_eq!(store.find_unprocessed_units(10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn identical_claims_from_different_topics_resolve_to_one_row() {
    let store = Arc::new(MemoryStore::new());
    let topic_a = topic("Topic A");
    let topic_b = topic("Topic B");
    store.insert_topic(&topic_a).await.unwrap();
    store.insert_topic(&topic_b).await.unwrap();

    let decomposer = Arc::new(
        MockDecomposer::new()
            .on_topic("Topic A", &["The sky is Blue."])
            .on_topic("Topic B", &["the sky is blue"]),
    );
    let stats = ExtractStage::new(store.clone(), decomposer)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.topics, 2);
    assert_eq!(stats.claims_created, 1);
    assert_eq!(stats.duplicate_references, 1);

    // The single row belongs to the first topic; the second records only a
    // duplicate reference.
    assert_eq!(store.claims_for_topic(topic_a.id).await.unwrap().len(), 1);
    assert!(store.claims_for_topic(topic_b.id).await.unwrap().is_empty());

    // Both topics still complete extraction.
    for t in store.list_topics(10).await.unwrap() {
        assert!(t.claims_extracted);
    }
}

#[tokio::test]
async fn decomposition_failure_leaves_topic_for_retry_without_blocking_siblings() {
    let store = Arc::new(MemoryStore::new());
    store.insert_topic(&topic("Broken")).await.unwrap();
    store.insert_topic(&topic("Healthy")).await.unwrap();

    // Only "Healthy" is registered; "Broken" fails like a dead collaborator.
    let decomposer = Arc::new(MockDecomposer::new().on_topic("Healthy", &["A fact."]));
    let stats = ExtractStage::new(store.clone(), decomposer)
        .run()
        .await
        .unwrap();

    assert_eq!(stats.topics, 1);
    assert_eq!(stats.claims_created, 1);

    let pending = store.find_topics_pending_extraction(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].title, "Broken");
}

#[tokio::test]
async fn empty_evidence_verification_uses_documented_defaults() {
    let store = Arc::new(MemoryStore::new());
    let (claim, _) = store
        .find_or_create_claim("The moon is made of rock.", "the moon is made of rock", None)
        .await
        .unwrap();

    // No stored units, no search hits, and a model that omits confidence.
    let news = Arc::new(MockNewsFetcher::new());
    let verdict = Arc::new(MockVerdictModel::affirm(None));
    let verify = verify_stage(store.clone(), news, verdict);

    let outcome = verify.verify_one(&claim).await.unwrap();
    assert!((outcome.confidence - 0.5).abs() < 1e-9, "confidence defaults to 0.5");
    assert!(
        (outcome.source_quality - 0.3).abs() < 1e-9,
        "empty evidence scores the quality floor"
    );
    assert!(!outcome.is_duplicate);
    assert!(outcome.previous_verifications.is_empty());
}

#[tokio::test]
async fn out_of_range_confidence_is_clamped() {
    let store = Arc::new(MemoryStore::new());
    let (claim, _) = store
        .find_or_create_claim("Rates rose.", "rates rose", None)
        .await
        .unwrap();

    let news = Arc::new(MockNewsFetcher::new().with_default_search(vec![reuters_hit()]));
    let verdict = Arc::new(MockVerdictModel::affirm(Some(3.2)));
    let verify = verify_stage(store.clone(), news, verdict);

    let outcome = verify.verify_one(&claim).await.unwrap();
    assert!((outcome.confidence - 1.0).abs() < 1e-9);
    // Quality fell back to the evidence URLs; the only hit is high-trust.
    assert!(outcome.source_quality > 0.5);
}

#[tokio::test]
async fn repeat_submission_reuses_the_claim_and_returns_history() {
    let store = Arc::new(MemoryStore::new());
    let news = Arc::new(MockNewsFetcher::new().with_default_search(vec![reuters_hit()]));
    let verdict = Arc::new(MockVerdictModel::affirm(Some(0.8)));
    let verify = Arc::new(verify_stage(store.clone(), news, verdict));
    let submitter = ClaimSubmitter::new(
        store.clone(),
        Arc::new(MockDecomposer::new().with_core_claim("The sky is blue.")),
        verify,
    );

    let first = submitter
        .submit_claim("I read somewhere that the sky is blue?")
        .await
        .unwrap();
    assert!(!first.is_duplicate);
    assert!(first.previous_verifications.is_empty());

    let second = submitter.submit_claim("THE SKY IS BLUE").await.unwrap();
    assert!(second.is_duplicate, "same normalized text is the same claim");
    assert_eq!(second.claim_id, first.claim_id);
    assert_eq!(second.previous_verifications.len(), 1);

    // Append-only history: two rows, newest first.
    let history = store
        .verifications_for_normalized("the sky is blue", 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[0].scored_at >= history[1].scored_at);
}

#[tokio::test]
async fn empty_submission_is_rejected() {
    let store = Arc::new(MemoryStore::new());
    let verify = Arc::new(verify_stage(
        store.clone(),
        Arc::new(MockNewsFetcher::new()),
        Arc::new(MockVerdictModel::affirm(Some(0.5))),
    ));
    let submitter = ClaimSubmitter::new(store, Arc::new(MockDecomposer::new()), verify);

    assert!(submitter.submit_claim("   ").await.is_err());
}

#[tokio::test]
async fn claims_only_become_verifiable_after_extraction() {
    let store = Arc::new(MemoryStore::new());
    store.insert_topic(&topic("Pending")).await.unwrap();

    let news = Arc::new(MockNewsFetcher::new());
    let verdict = Arc::new(MockVerdictModel::affirm(Some(0.7)));
    let verify = verify_stage(store.clone(), news, verdict);

    // Before extraction there is nothing to verify.
    let stats = verify.run().await.unwrap();
    assert_eq!(stats.claims, 0);

    let decomposer = Arc::new(MockDecomposer::new().on_topic("Pending", &["A checkable fact."]));
    ExtractStage::new(store.clone(), decomposer)
        .run()
        .await
        .unwrap();

    let stats = verify.run().await.unwrap();
    assert_eq!(stats.verified, 1);
}

#[tokio::test]
async fn refinement_adds_a_derived_field_and_preserves_the_original() {
    let store = Arc::new(MemoryStore::new());
    let (claim, _) = store
        .find_or_create_claim("Power is out.", "power is out", None)
        .await
        .unwrap();
    let verify = verify_stage(
        store.clone(),
        Arc::new(MockNewsFetcher::new()),
        Arc::new(MockVerdictModel::affirm(Some(0.6))),
    );
    verify.verify_one(&claim).await.unwrap();

    let stats = RefineStage::new(store.clone(), Arc::new(MockRefiner))
        .run()
        .await
        .unwrap();
    assert_eq!(stats.refined, 1);

    let stored = &store.verifications_for_claim(claim.id).await.unwrap()[0];
    assert_eq!(
        stored.analyst_explanation, "Multiple items corroborate the claim.",
        "original analyst explanation must never change"
    );
    assert_eq!(
        stored.refined_explanation.as_deref(),
        Some("refined: Multiple items corroborate the claim.")
    );

    // Idempotent: a second run finds nothing to rewrite.
    let stats = RefineStage::new(store, Arc::new(MockRefiner))
        .run()
        .await
        .unwrap();
    assert_eq!(stats.refined, 0);
}
