pub mod config;
pub mod error;
pub mod normalize;
pub mod quality;
pub mod types;

pub use config::Config;
pub use error::FactlineError;
pub use normalize::normalize_claim;
pub use quality::source_quality;
pub use types::*;
