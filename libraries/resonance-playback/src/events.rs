//! Playback events
//!
//! Everything the core reports upward travels as a `PlaybackEvent`: transport
//! state changes, position updates, spectrum frames, queue moves and
//! failures. Each event carries the wall-clock time it was raised.

use crate::types::PlaybackState;
use chrono::{DateTime, Utc};
use resonance_audio::effects::EqSettings;
use resonance_audio::SpectrumFrame;
use resonance_core::{StoreFailure, TrackId};

/// A timestamped event
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackEvent {
    pub at: DateTime<Utc>,
    pub kind: EventKind,
}

impl PlaybackEvent {
    /// Stamp `kind` with the current time
    pub fn now(kind: EventKind) -> Self {
        Self {
            at: Utc::now(),
            kind,
        }
    }

    /// Whether the event may be dropped when the event queue is full
    ///
    /// Position updates and spectrum frames are superseded by the next one;
    /// everything else must reach the consumer.
    pub fn is_droppable(&self) -> bool {
        matches!(
            self.kind,
            EventKind::PositionUpdate { .. } | EventKind::Spectrum(_)
        )
    }
}

/// What happened
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Transport state changed
    StateChanged { state: PlaybackState },

    /// A track was opened and is ready at position 0
    TrackLoaded { track_id: TrackId, duration_secs: f64 },

    /// Periodic position report while playing
    PositionUpdate { position_secs: f64, duration_secs: f64 },

    /// Post-equalizer spectrum frame
    Spectrum(SpectrumFrame),

    /// The active track played to its end
    TrackEnded { track_id: TrackId },

    /// The queue cursor moved
    QueuePositionChanged { index: usize, track_id: TrackId },

    /// Navigation was requested on an empty queue
    QueueEmpty,

    /// Equalizer settings changed
    EqualizerChanged(EqSettings),

    /// Master volume changed
    VolumeChanged { level: u8, muted: bool },

    /// Non-fatal failure
    Failure(PlaybackFailure),
}

/// Failures reported as events rather than returned errors
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackFailure {
    /// Source could not be opened or failed mid-stream; transport stopped
    SourceUnavailable { track_id: TrackId, reason: String },

    /// A library store write failed; the in-memory value was kept
    LibraryWriteFailed(StoreFailure),
}

impl From<EventKind> for PlaybackEvent {
    fn from(kind: EventKind) -> Self {
        Self::now(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_periodic_events_are_droppable() {
        let position = PlaybackEvent::now(EventKind::PositionUpdate {
            position_secs: 1.0,
            duration_secs: 2.0,
        });
        assert!(position.is_droppable());

        let ended = PlaybackEvent::now(EventKind::TrackEnded {
            track_id: TrackId::new("a"),
        });
        assert!(!ended.is_droppable());

        let stopped = PlaybackEvent::now(EventKind::StateChanged {
            state: PlaybackState::Stopped,
        });
        assert!(!stopped.is_droppable());
    }
}
