use thiserror::Error;

#[derive(Error, Debug)]
pub enum FactlineError {
    #[error("Schema violation in model output: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Stage lease conflict: another '{0}' run is in progress")]
    LeaseConflict(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
