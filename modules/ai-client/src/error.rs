use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiClientError {
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Model returned no content")]
    EmptyResponse,

    /// The model's output did not match the requested schema. Callers treat
    /// this as a distinct, retryable failure rather than reading fields
    /// optimistically.
    #[error("Schema-invalid model output: {reason}")]
    InvalidPayload { reason: String, payload: String },
}
