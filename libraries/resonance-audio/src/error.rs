/// Audio-specific errors
use thiserror::Error;

/// Result type alias using `AudioError`
pub type Result<T> = std::result::Result<T, AudioError>;

/// Audio error types
#[derive(Error, Debug)]
pub enum AudioError {
    /// A source could not be opened or decoded
    #[error("Source unavailable ({reference}): {reason}")]
    SourceUnavailable { reference: String, reason: String },

    /// Caller broke an API contract
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// Decoding error mid-stream
    #[error("Decode error: {0}")]
    Decode(String),

    /// Seek error
    #[error("Seek error: {0}")]
    Seek(String),

    /// Output device error
    #[error("Output error: {0}")]
    Output(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AudioError {
    /// Create a source-unavailable error
    pub fn unavailable(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            reference: reference.into(),
            reason: reason.into(),
        }
    }

    /// Create a precondition violation
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionViolation(msg.into())
    }
}
