//! Error types for changegate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    // Execution errors
    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("Stage not found: {0}")]
    StageNotFound(String),

    #[error("Unsupported job kind: {0}")]
    UnsupportedJobKind(String),

    // Gate errors
    #[error("Token already registered for execution: {0}")]
    TokenConflict(String),

    #[error("Change control aborted: {0}")]
    Aborted(String),

    #[error("Step could not be associated: {0}")]
    StepMappingFailed(String),

    // Scheduler errors
    #[error("Scheduler rejected request: {0}")]
    Scheduler(String),

    // Infrastructure errors
    #[error("Network error: {0}")]
    Network(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}
