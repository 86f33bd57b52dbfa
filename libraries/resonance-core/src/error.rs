/// Core error types for Resonance
use crate::types::TrackId;
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoreError {
    /// Track not found in the library
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    /// Duplicate entry
    #[error("Duplicate entry: {0}")]
    Duplicate(String),

    /// Caller broke an API contract (negative duration, bad index)
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// Library store rejected an operation
    #[error("Store error: {0}")]
    Store(String),
}

impl CoreError {
    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    /// Create a precondition violation
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionViolation(msg.into())
    }
}
