//! Error types for the Motivate preference learning engine
//!
//! This module provides structured error definitions using thiserror and
//! classifies which failures callers are expected to recover from.

use thiserror::Error;

/// Main error type for Motivate operations
#[derive(Error, Debug)]
pub enum MotivateError {
    /// Out-of-range OCEAN value or malformed record
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Training attempted with too few preference pairs
    #[error("Insufficient data: have {have} preference pairs, need at least {need}")]
    InsufficientData { have: usize, need: usize },

    /// Scoring attempted before any reward model was published
    #[error("Reward model has not been trained")]
    ModelNotTrained,

    /// Generator or embedder failed or timed out
    #[error("Collaborator unavailable: {0}")]
    CollaboratorUnavailable(String),

    /// Embedding dimensionality does not match the trained model
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Scoring with a different embedder than the model was trained against
    #[error("Embedder mismatch: model trained with '{expected}', scoring with '{actual}'")]
    EmbedderMismatch { expected: String, actual: String },

    /// Persisted state is inconsistent (corrupt line, cursor regression)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl MotivateError {
    /// Whether the caller can continue with a degraded behavior
    /// (wait for more feedback, fall back to a neutral score, use a placeholder).
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MotivateError::InsufficientData { .. }
                | MotivateError::ModelNotTrained
                | MotivateError::CollaboratorUnavailable(_)
        )
    }
}

/// Result type alias for Motivate operations
pub type Result<T> = std::result::Result<T, MotivateError>;

/// Convert anyhow::Error to MotivateError
impl From<anyhow::Error> for MotivateError {
    fn from(err: anyhow::Error) -> Self {
        MotivateError::Other(err.to_string())
    }
}
