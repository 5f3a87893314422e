pub mod error;
pub mod openai;
pub mod schema;

pub use error::AiClientError;
pub use openai::OpenAi;
pub use schema::{strip_markdown_fences, StructuredOutput};
