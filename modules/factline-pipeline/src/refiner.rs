use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use ai_client::OpenAi;

use crate::traits::{into_pipeline_error, ExplanationRefiner};

const REFINE_SYSTEM_PROMPT: &str = r#"You rewrite fact-check explanations to be more concise and clear while keeping every key point.

Return a JSON object: {"refined": "..."}"#;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RefinementResponse {
    pub refined: String,
}

pub struct Refiner {
    llm: OpenAi,
}

impl Refiner {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            llm: OpenAi::new(api_key, model).with_base_url(base_url),
        }
    }
}

#[async_trait]
impl ExplanationRefiner for Refiner {
    async fn refine(&self, explanation: &str) -> Result<String> {
        let user = format!("Original explanation: {explanation}");
        let response: RefinementResponse = self
            .llm
            .extract(REFINE_SYSTEM_PROMPT, &user)
            .await
            .map_err(into_pipeline_error)?;
        Ok(response.refined.trim().to_string())
    }
}
