//! Error types for the Umrah Guide workspace.
//!
//! One unified enum covers the generic categories (configuration, I/O,
//! serialization, prompts) and every failure kind of the retrieval engine,
//! so callers can tell "no matching data" apart from "system failure".

use thiserror::Error;

/// Unified error type for the Umrah Guide workspace.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Prompt template errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// LLM client construction or transport errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// A source record lacks required fields and was skipped.
    #[error("Record rejected ({kind}): {reason}")]
    NormalizationRejected { kind: String, reason: String },

    /// Retryable embedding failure (rate limit, timeout, unavailable).
    #[error("Transient embedding failure: {0}")]
    EmbeddingTransient(String),

    /// Non-retryable embedding failure (invalid input, bad response).
    #[error("Permanent embedding failure: {0}")]
    EmbeddingPermanent(String),

    /// The index was built with a different embedding model than the one querying it.
    #[error("Embedding model mismatch: index built with {expected}, querying with {actual}")]
    EmbeddingModelMismatch { expected: String, actual: String },

    /// No snapshot exists at the configured location.
    #[error("Index snapshot not found at {0}")]
    IndexNotFound(String),

    /// A snapshot exists but cannot be read back.
    #[error("Index snapshot is corrupt: {0}")]
    IndexCorrupt(String),

    /// The generative model call failed.
    #[error("Generative model failure: {0}")]
    GenerativeModel(String),

    /// An external call exceeded its deadline.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// Knowledge base and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether retrying the failed operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::EmbeddingTransient(_))
    }

    /// Whether the error means "no snapshot yet" as opposed to a broken one.
    pub fn is_index_not_found(&self) -> bool {
        matches!(self, AppError::IndexNotFound(_))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(AppError::EmbeddingTransient("429".to_string()).is_transient());
        assert!(!AppError::EmbeddingPermanent("bad input".to_string()).is_transient());
        assert!(!AppError::GenerativeModel("down".to_string()).is_transient());
    }

    #[test]
    fn test_not_found_is_distinct_from_corrupt() {
        assert!(AppError::IndexNotFound("x".to_string()).is_index_not_found());
        assert!(!AppError::IndexCorrupt("x".to_string()).is_index_not_found());
    }

    #[test]
    fn test_timeout_message() {
        let err = AppError::Timeout {
            operation: "generation".to_string(),
            secs: 30,
        };
        assert_eq!(err.to_string(), "generation timed out after 30s");
    }
}
