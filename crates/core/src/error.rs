//! Error types for llamaserve.
//!
//! This module defines a unified error enum covering configuration, I/O,
//! inference, document loading, indexing, embedding and prompt errors.

use thiserror::Error;

/// Unified error type for llamaserve.
///
/// All fallible functions in the workspace return `Result<T, AppError>`.
/// Errors are represented and propagated, never returned disguised as data.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A caller-supplied argument is outside the accepted set
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Language model loading or inference errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Document loading errors (bad file, missing path, parse failure)
    #[error("Load error: {0}")]
    Load(String),

    /// Vector index build, persistence and query errors
    #[error("Index error: {0}")]
    Index(String),

    /// Embedding model errors
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error was caused by invalid caller input rather than a runtime fault.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, AppError::InvalidArgument(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
