//! Error types for playback

use resonance_audio::AudioError;
use resonance_core::{CoreError, TrackId};
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// The active track's source could not be opened or decoded
    #[error("Source unavailable for track {track_id}: {reason}")]
    SourceUnavailable { track_id: TrackId, reason: String },

    /// Navigation requested on an empty queue
    #[error("Queue is empty")]
    EmptyQueue,

    /// Track is not part of the queue
    #[error("Track not in queue: {0}")]
    TrackNotInQueue(TrackId),

    /// Caller broke an API contract
    #[error("Precondition violated: {0}")]
    PreconditionViolation(String),

    /// The audio thread has stopped
    #[error("Audio engine disconnected")]
    EngineDisconnected,

    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Audio(#[from] AudioError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl PlaybackError {
    /// Create a precondition violation
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionViolation(msg.into())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
