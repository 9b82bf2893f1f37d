//! Error types for decoding API payloads.

use thiserror::Error;

/// Result type alias using ModelError.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while turning a server payload into a canonical record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Unknown stage: {0}")]
    UnknownStage(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),
}
