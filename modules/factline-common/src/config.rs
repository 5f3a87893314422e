use std::env;

use tracing::info;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Store
    pub database_url: String,

    // LLM provider (OpenAI-compatible chat completions)
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_model: String,

    // Embedding provider (OpenAI-compatible embeddings)
    pub embedding_api_key: String,
    pub embedding_base_url: String,
    pub embedding_model: String,

    // News source / evidence search
    pub news_api_key: String,
    pub news_base_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            llm_api_key: required_env("LLM_API_KEY"),
            llm_base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "https://api.groq.com/openai/v1".to_string()),
            llm_model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string()),
            embedding_api_key: required_env("EMBEDDING_API_KEY"),
            embedding_base_url: env::var("EMBEDDING_BASE_URL")
                .unwrap_or_else(|_| "https://api.voyageai.com/v1".to_string()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "voyage-3-large".to_string()),
            news_api_key: required_env("NEWS_API_KEY"),
            news_base_url: env::var("NEWS_BASE_URL")
                .unwrap_or_else(|_| "https://newsapi.org/v2".to_string()),
        }
    }

    /// Log a startup summary without leaking credentials.
    pub fn log_redacted(&self) {
        info!(
            llm_base_url = self.llm_base_url.as_str(),
            llm_model = self.llm_model.as_str(),
            embedding_base_url = self.embedding_base_url.as_str(),
            embedding_model = self.embedding_model.as_str(),
            news_base_url = self.news_base_url.as_str(),
            "Configuration loaded (keys redacted)"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
