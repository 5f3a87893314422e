use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use ai_client::OpenAi;
use factline_common::{EvidenceItem, Verdict};

use crate::traits::{into_pipeline_error, VerdictModel};

const VERDICT_SYSTEM_PROMPT: &str = r#"You are a fact-checking analyst. Verify the claim based ONLY on the evidence provided.

Return a JSON object with:
- "verdict": "True", "False", or "Unclear"
- "confidence": a number between 0 and 1
- "public_explanation": a 2-3 line citizen-friendly explanation in simple language
- "analyst_explanation": a 5-8 line detailed explanation for analysts, including reasoning and source quality notes
- "sources": the titles or URLs of the evidence items that support the verdict

If the evidence does not address the claim, the verdict is "Unclear"."#;

/// Schema-validated verdict payload. Optional fields cover models that omit
/// them; the verification stage supplies the documented defaults.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct VerdictResponse {
    pub verdict: Verdict,
    pub confidence: Option<f64>,
    pub public_explanation: Option<String>,
    pub analyst_explanation: Option<String>,
    #[serde(default)]
    pub sources: Vec<String>,
}

pub struct VerdictScorer {
    llm: OpenAi,
}

impl VerdictScorer {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            llm: OpenAi::new(api_key, model).with_base_url(base_url),
        }
    }
}

#[async_trait]
impl VerdictModel for VerdictScorer {
    async fn score(&self, claim: &str, evidence: &[EvidenceItem]) -> Result<VerdictResponse> {
        let evidence_text = if evidence.is_empty() {
            "No evidence was found.".to_string()
        } else {
            evidence
                .iter()
                .map(|e| format!("- [{}] {}: {}", e.source, e.title, e.text))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let user = format!("Claim: \"{claim}\"\n\nEvidence:\n{evidence_text}");

        self.llm
            .extract(VERDICT_SYSTEM_PROMPT, &user)
            .await
            .map_err(into_pipeline_error)
    }
}
