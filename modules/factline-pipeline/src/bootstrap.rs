// Production wiring. Pure assembly — no logic, no side effects. Every
// collaborator is constructed once here and injected into the stage that
// owns it; nothing is lazily initialized behind a global.

use std::sync::Arc;

use factline_common::Config;
use factline_store::Store;

use crate::classifier::Classifier;
use crate::cluster::ClusterStage;
use crate::decomposer::Decomposer;
use crate::embedder::Embedder;
use crate::extract::ExtractStage;
use crate::ingest::IngestStage;
use crate::news::NewsApiClient;
use crate::refine::RefineStage;
use crate::refiner::Refiner;
use crate::retrieval::Retriever;
use crate::scheduler::StageScheduler;
use crate::submit::ClaimSubmitter;
use crate::traits::{
    ClaimDecomposer, ExplanationRefiner, NewsFetcher, TextEmbedder, TopicClassifier, VerdictModel,
};
use crate::verdict::VerdictScorer;
use crate::verify::VerifyStage;

/// The assembled pipeline: the scheduled stage loops plus the synchronous
/// submission surface.
pub struct Pipeline {
    pub scheduler: StageScheduler,
    pub submitter: ClaimSubmitter,
}

pub fn build_pipeline(config: &Config, store: Arc<dyn Store>) -> Pipeline {
    let news: Arc<dyn NewsFetcher> = Arc::new(
        NewsApiClient::new(&config.news_api_key).with_base_url(&config.news_base_url),
    );
    let embedder: Arc<dyn TextEmbedder> = Arc::new(Embedder::new(
        &config.embedding_api_key,
        &config.embedding_base_url,
        &config.embedding_model,
    ));
    let classifier: Arc<dyn TopicClassifier> = Arc::new(Classifier::new(
        &config.llm_api_key,
        &config.llm_base_url,
        &config.llm_model,
    ));
    let decomposer: Arc<dyn ClaimDecomposer> = Arc::new(Decomposer::new(
        &config.llm_api_key,
        &config.llm_base_url,
        &config.llm_model,
    ));
    let verdict_model: Arc<dyn VerdictModel> = Arc::new(VerdictScorer::new(
        &config.llm_api_key,
        &config.llm_base_url,
        &config.llm_model,
    ));
    let refiner: Arc<dyn ExplanationRefiner> = Arc::new(Refiner::new(
        &config.llm_api_key,
        &config.llm_base_url,
        &config.llm_model,
    ));

    let retriever = Retriever::new(store.clone(), embedder.clone());

    let ingest = Arc::new(IngestStage::new(store.clone(), news.clone(), embedder));
    let cluster = Arc::new(ClusterStage::new(store.clone(), classifier));
    let extract = Arc::new(ExtractStage::new(store.clone(), decomposer.clone()));
    let verify = Arc::new(VerifyStage::new(
        store.clone(),
        retriever,
        news,
        verdict_model,
    ));
    let refine = Arc::new(RefineStage::new(store.clone(), refiner));

    let submitter = ClaimSubmitter::new(store.clone(), decomposer, verify.clone());
    let scheduler = StageScheduler::new(store, ingest, cluster, extract, verify, refine);

    Pipeline {
        scheduler,
        submitter,
    }
}
