/// Track domain type
use crate::error::{CoreError, Result};
use crate::types::{SourceRef, TrackId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Library track
///
/// `play_count` and `favorite` are only mutated through `LibraryIndex`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,

    /// Track title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Album name
    pub album: String,

    /// Track duration in milliseconds
    pub duration_ms: u64,

    /// Handle the decoder resolves into a sample stream
    pub source: SourceRef,

    /// Number of explicit selections
    pub play_count: u32,

    /// Favorite flag
    pub favorite: bool,

    /// When the track was added to the library
    pub added_at: DateTime<Utc>,
}

impl Track {
    /// Create a new track with an unknown duration
    pub fn new(
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: TrackId::generate(),
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
            duration_ms: 0,
            source: SourceRef::new(source),
            play_count: 0,
            favorite: false,
            added_at: Utc::now(),
        }
    }

    /// Replace the generated id
    pub fn with_id(mut self, id: impl Into<TrackId>) -> Self {
        self.id = id.into();
        self
    }

    /// Set the duration from seconds
    ///
    /// Negative or non-finite durations are rejected.
    pub fn with_duration_secs(mut self, seconds: f64) -> Result<Self> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(CoreError::precondition(format!(
                "track duration must be a non-negative number of seconds, got {seconds}"
            )));
        }
        self.duration_ms = (seconds * 1000.0).round() as u64;
        Ok(self)
    }

    /// Set the duration
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// Set the added timestamp
    pub fn with_added_at(mut self, added_at: DateTime<Utc>) -> Self {
        self.added_at = added_at;
        self
    }

    /// Get the track duration
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Get the track duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.duration_ms as f64 / 1000.0
    }
}
