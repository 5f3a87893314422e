use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use ai_client::OpenAi;

use crate::traits::{into_pipeline_error, ClaimDecomposer};

const DECOMPOSE_SYSTEM_PROMPT: &str = r#"You decompose news topics into atomic factual claims.

Given a topic title and summary, extract the factual claims that can be independently verified. Each claim must be a single self-contained sentence. Skip opinions, predictions, and questions.

Return a JSON object: {"claims": ["claim 1", "claim 2", ...]}"#;

const CORE_CLAIM_SYSTEM_PROMPT: &str = r#"You extract the core factual claim from a text.

Return the claim as a single sentence. If the text contains several claims, pick the most significant one.

Return a JSON object: {"claim": "..."}"#;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DecompositionResponse {
    #[serde(default)]
    pub claims: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CoreClaimResponse {
    pub claim: String,
}

pub struct Decomposer {
    llm: OpenAi,
}

impl Decomposer {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            llm: OpenAi::new(api_key, model).with_base_url(base_url),
        }
    }
}

#[async_trait]
impl ClaimDecomposer for Decomposer {
    async fn decompose(&self, topic_title: &str, topic_summary: &str) -> Result<Vec<String>> {
        let user = format!("Topic: {topic_title}\nSummary: {topic_summary}");
        let response: DecompositionResponse = self
            .llm
            .extract(DECOMPOSE_SYSTEM_PROMPT, &user)
            .await
            .map_err(into_pipeline_error)?;
        Ok(response.claims)
    }

    async fn extract_core_claim(&self, text: &str) -> Result<String> {
        let user = format!("Text: {text}");
        let response: CoreClaimResponse = self
            .llm
            .extract(CORE_CLAIM_SYSTEM_PROMPT, &user)
            .await
            .map_err(into_pipeline_error)?;
        Ok(response.claim.trim().to_string())
    }
}
