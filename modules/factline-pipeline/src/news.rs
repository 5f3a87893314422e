// NewsAPI-style client. Covers both pipeline uses: top headlines for
// ingestion and relevance-sorted search for claim evidence.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use factline_common::{Article, SearchHit};

use crate::traits::NewsFetcher;

const NEWSAPI_BASE_URL: &str = "https://newsapi.org/v2";

/// How many headlines one ingestion run pulls.
const HEADLINES_PAGE_SIZE: u32 = 20;

/// How many search results feed one claim verification.
const SEARCH_PAGE_SIZE: u32 = 5;

pub struct NewsApiClient {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl NewsApiClient {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: NEWSAPI_BASE_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    async fn get(&self, path: &str, params: &[(&str, &str)]) -> Result<NewsApiResponse> {
        let url = format!("{}/{path}", self.base_url);

        debug!(path, "News API request");

        let response = self
            .http
            .get(&url)
            .query(params)
            .query(&[("apiKey", self.api_key.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("News API error ({status}): {body}"));
        }

        let payload: NewsApiResponse = response.json().await?;
        if payload.status != "ok" {
            return Err(anyhow!(
                "News API error: {}",
                payload.message.unwrap_or_else(|| "unknown".to_string())
            ));
        }
        Ok(payload)
    }
}

#[async_trait]
impl NewsFetcher for NewsApiClient {
    async fn top_headlines(&self) -> Result<Vec<Article>> {
        let page_size = HEADLINES_PAGE_SIZE.to_string();
        let payload = self
            .get(
                "top-headlines",
                &[
                    ("country", "us"),
                    ("category", "general"),
                    ("pageSize", page_size.as_str()),
                ],
            )
            .await?;

        Ok(payload
            .articles
            .into_iter()
            .filter_map(|a| {
                // Articles without a URL or title cannot be deduplicated or
                // clustered — drop them here.
                let url = a.url?;
                let title = a.title?;
                Some(Article {
                    url,
                    title,
                    description: a.description,
                    content: a.content,
                    source_name: a.source.and_then(|s| s.name),
                    published_at: a.published_at,
                })
            })
            .collect())
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let page_size = SEARCH_PAGE_SIZE.to_string();
        let payload = self
            .get(
                "everything",
                &[
                    ("q", query),
                    ("sortBy", "relevancy"),
                    ("language", "en"),
                    ("pageSize", page_size.as_str()),
                ],
            )
            .await?;

        Ok(payload
            .articles
            .into_iter()
            .filter_map(|a| {
                let url = a.url?;
                let title = a.title?;
                Some(SearchHit {
                    title,
                    description: a.description,
                    url,
                    source: a.source.and_then(|s| s.name),
                })
            })
            .collect())
    }
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct NewsApiResponse {
    status: String,
    message: Option<String>,
    #[serde(default)]
    articles: Vec<NewsApiArticle>,
}

#[derive(Debug, Deserialize)]
struct NewsApiArticle {
    source: Option<NewsApiSource>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    content: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct NewsApiSource {
    name: Option<String>,
}
