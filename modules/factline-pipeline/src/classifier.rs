use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;

use ai_client::OpenAi;
use factline_common::Category;

use crate::traits::{into_pipeline_error, ArticleDigest, TopicCluster, TopicClassifier};

const CLASSIFY_SYSTEM_PROMPT: &str = r#"You are a news editor grouping articles into distinct topics.

You receive a numbered list of articles. Identify the main topics and return a JSON object with a "topics" array. For each topic provide:
- "title": a concise topic title
- "summary": a 2-sentence summary
- "category": one of "general", "election", "health", "disaster", "finance"
- "member_indices": the numbers of the articles that belong to this topic

Assign each article to at most one topic. Leave out articles that do not fit any topic."#;

/// What the model returns for one topic grouping.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ClusterPayload {
    pub title: String,
    pub summary: String,
    pub category: String,
    pub member_indices: Vec<usize>,
}

/// The full classification response.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ClassificationResponse {
    #[serde(default)]
    pub topics: Vec<ClusterPayload>,
}

pub struct Classifier {
    llm: OpenAi,
}

impl Classifier {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Self {
        Self {
            llm: OpenAi::new(api_key, model).with_base_url(base_url),
        }
    }
}

#[async_trait]
impl TopicClassifier for Classifier {
    async fn classify(&self, digests: &[ArticleDigest]) -> Result<Vec<TopicCluster>> {
        let articles = digests
            .iter()
            .map(|d| format!("[{}] Title: {}\nDescription: {}", d.index, d.title, d.description))
            .collect::<Vec<_>>()
            .join("\n\n");

        let user = format!("Group the following news articles into topics.\n\nArticles:\n{articles}");

        let response: ClassificationResponse = self
            .llm
            .extract(CLASSIFY_SYSTEM_PROMPT, &user)
            .await
            .map_err(into_pipeline_error)?;

        Ok(response
            .topics
            .into_iter()
            .map(|c| TopicCluster {
                title: c.title,
                summary: c.summary,
                category: Category::parse_lenient(&c.category),
                member_indices: c.member_indices,
            })
            .collect())
    }
}
