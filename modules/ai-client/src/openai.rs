use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AiClientError;
use crate::schema::{strip_markdown_fences, StructuredOutput};

const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Client for any OpenAI-compatible API (OpenAI, Groq, Voyage, ...).
///
/// One instance covers chat completions, schema-validated structured
/// output, and embeddings against a single base URL.
#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    embedding_model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAi {
    pub fn new(api_key: &str, model: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            embedding_model: model.to_string(),
            base_url: OPENAI_API_URL.to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_embedding_model(mut self, model: &str) -> Self {
        self.embedding_model = model.to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap, AiClientError> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|_| {
            AiClientError::Api {
                status: 0,
                body: "API key contains invalid header characters".to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn post_chat(&self, request: &ChatRequest) -> Result<String, AiClientError> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %request.model, "Chat completion request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiClientError::Api { status, body });
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AiClientError::EmptyResponse)
    }

    /// Free-text chat completion.
    pub async fn chat(&self, system: &str, user: &str) -> Result<String, AiClientError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: Message::pair(system, user),
            temperature: 0.7,
            max_tokens: 2000,
            response_format: None,
        };
        self.post_chat(&request).await
    }

    /// Structured chat completion: the response is requested in strict JSON
    /// mode against `T`'s generated schema and deserialized into `T`.
    /// A payload that does not match the schema is an `InvalidPayload`
    /// error, never a partially-read value.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system: &str,
        user: &str,
    ) -> Result<T, AiClientError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: Message::pair(system, user),
            temperature: 0.2,
            max_tokens: 2000,
            response_format: Some(ResponseFormat::json_schema::<T>()),
        };

        let content = self.post_chat(&request).await?;
        let payload = strip_markdown_fences(&content);

        serde_json::from_str(payload).map_err(|e| AiClientError::InvalidPayload {
            reason: e.to_string(),
            payload: payload.to_string(),
        })
    }

    /// Embed a single text.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, AiClientError> {
        let mut vectors = self.embed_texts(&[text.to_string()]).await?;
        vectors.pop().ok_or(AiClientError::EmptyResponse)
    }

    /// Embed multiple texts in one request.
    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, AiClientError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_texts(&texts).await
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AiClientError> {
        let url = format!("{}/embeddings", self.base_url);

        let request = EmbeddingRequest {
            model: self.embedding_model.clone(),
            input: texts.to_vec(),
        };

        debug!(model = %request.model, texts = texts.len(), "Embedding request");

        let response = self
            .http
            .post(&url)
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiClientError::Api { status, body });
        }

        let embeddings: EmbeddingResponse = response.json().await?;
        Ok(embeddings.data.into_iter().map(|d| d.embedding).collect())
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

impl Message {
    fn pair(system: &str, user: &str) -> Vec<Message> {
        vec![
            Message {
                role: "system",
                content: system.to_string(),
            },
            Message {
                role: "user",
                content: user.to_string(),
            },
        ]
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: serde_json::Value,
}

impl ResponseFormat {
    fn json_schema<T: StructuredOutput>() -> Self {
        Self {
            kind: "json_schema",
            json_schema: serde_json::json!({
                "name": T::type_name(),
                "strict": true,
                "schema": T::structured_schema(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}
