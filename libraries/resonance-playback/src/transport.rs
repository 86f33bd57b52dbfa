//! Transport state machine
//!
//! Owns play/pause/stop/seek, the active decode context and the sample clock.
//! The transport never decides what plays next: when the active track runs
//! out it reports `RenderOutcome::EndOfTrack` once and waits for the queue to
//! load something else.
//!
//! ```text
//! Stopped ──play──▶ Playing ──pause──▶ Paused
//!    ▲                 │  ◀───play───────┘
//!    └──────stop───────┴─────────────────┘
//! load_track: any ──▶ Stopped (new track, position 0)
//! ```

use crate::error::{PlaybackError, Result};
use crate::types::PlaybackState;
use resonance_audio::{SampleClock, SampleStream, SourceResolver};
use resonance_core::{Track, TrackId};
use std::sync::Arc;
use std::time::Duration;

/// Result of rendering one block
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    /// `n` interleaved samples were written to the front of the block
    Rendered(usize),
    /// Not playing; nothing written
    Idle,
    /// The active track reached its end; reported once per track end
    EndOfTrack,
    /// The source failed mid-stream; the transport is now stopped
    Failed { track_id: TrackId, reason: String },
}

/// Playback state, active track and decode context
pub struct Transport {
    resolver: Arc<dyn SourceResolver>,
    state: PlaybackState,
    track: Option<Track>,
    stream: Option<Box<dyn SampleStream>>,
    clock: SampleClock,
    /// Seconds; 0 when unknown
    duration: f64,
    ended: bool,
    /// Read error held back until the samples decoded before it are rendered
    deferred_failure: Option<String>,
}

impl Transport {
    pub fn new(resolver: Arc<dyn SourceResolver>) -> Self {
        Self {
            resolver,
            state: PlaybackState::Stopped,
            track: None,
            stream: None,
            clock: SampleClock::new(),
            duration: 0.0,
            ended: false,
            deferred_failure: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Current position in seconds, within [0, duration]
    pub fn position(&self) -> f64 {
        let position = self.clock.position();
        if self.duration > 0.0 {
            position.min(self.duration)
        } else {
            position
        }
    }

    /// Active track duration in seconds (0 when unknown)
    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn active_track(&self) -> Option<&Track> {
        self.track.as_ref()
    }

    /// Sample rate and channel count of the open stream
    pub fn format(&self) -> Option<(u32, usize)> {
        self.stream
            .as_ref()
            .map(|stream| (stream.sample_rate(), stream.channels()))
    }

    /// Whether the active track has played to its end
    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Make `track` active, stopped at position 0
    ///
    /// The previous decode context is torn down before the new source is
    /// opened. If the new source cannot be opened there is no active track
    /// afterwards and `SourceUnavailable` is returned; no retry is attempted.
    pub fn load_track(&mut self, track: Track) -> Result<()> {
        self.stream = None;
        self.track = None;
        self.state = PlaybackState::Stopped;
        self.clock.reset(0.0);
        self.duration = 0.0;
        self.ended = false;
        self.deferred_failure = None;

        let stream = match self.resolver.open(&track.source) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(track_id = %track.id, error = %e, "Failed to open source");
                return Err(PlaybackError::SourceUnavailable {
                    track_id: track.id,
                    reason: e.to_string(),
                });
            }
        };

        self.duration = if track.duration_ms > 0 {
            track.duration_secs()
        } else {
            stream
                .duration()
                .map_or(0.0, |duration| duration.as_secs_f64())
        };

        tracing::info!(
            track_id = %track.id,
            title = %track.title,
            duration = self.duration,
            sample_rate = stream.sample_rate(),
            channels = stream.channels(),
            "Track loaded"
        );

        self.stream = Some(stream);
        self.track = Some(track);
        Ok(())
    }

    /// Stopped/Paused → Playing
    ///
    /// No-op without an active track, or once the track has ended.
    pub fn play(&mut self) -> bool {
        if self.stream.is_none() || self.ended || self.state == PlaybackState::Playing {
            return false;
        }
        tracing::debug!(from = %self.state, "Transport → playing");
        self.state = PlaybackState::Playing;
        true
    }

    /// Playing → Paused
    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        tracing::debug!("Transport → paused");
        self.state = PlaybackState::Paused;
        true
    }

    /// Any → Stopped, position 0
    ///
    /// The active track stays loaded. Fails with `SourceUnavailable` if the
    /// stream cannot be rewound, in which case the track is unloaded.
    pub fn stop(&mut self) -> Result<bool> {
        let changed = self.state != PlaybackState::Stopped;
        self.state = PlaybackState::Stopped;
        self.ended = false;
        self.deferred_failure = None;
        self.clock.reset(0.0);

        if let Some(stream) = self.stream.as_mut() {
            if let Err(e) = stream.seek(Duration::ZERO) {
                return Err(self.failure(&e.to_string()));
            }
        }
        if changed {
            tracing::debug!("Transport → stopped");
        }
        Ok(changed)
    }

    /// Move to `seconds`, clamped to [0, duration]
    ///
    /// Only applies while Playing or Paused; returns the applied position.
    /// Samples decoded before the seek are discarded by the stream.
    pub fn seek(&mut self, seconds: f64) -> Result<f64> {
        if !seconds.is_finite() {
            return Err(PlaybackError::precondition(format!(
                "seek target {seconds} is not finite"
            )));
        }
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            tracing::debug!(state = %self.state, "Seek ignored");
            return Ok(self.position());
        }

        // Unknown duration: bounded only by what a Duration can hold
        let upper = if self.duration > 0.0 {
            self.duration
        } else {
            Duration::MAX.as_secs_f64()
        };
        let target = seconds.clamp(0.0, upper);
        if target != seconds {
            tracing::debug!(requested = seconds, applied = target, "Seek target clamped");
        }
        let offset = Duration::try_from_secs_f64(target).unwrap_or(Duration::MAX);

        if let Some(stream) = self.stream.as_mut() {
            if let Err(e) = stream.seek(offset) {
                return Err(self.failure(&e.to_string()));
            }
        }
        self.clock.reset(target);
        self.ended = false;
        self.deferred_failure = None;
        Ok(target)
    }

    /// Decode the next block into `buffer` while Playing
    ///
    /// Writes whole frames only and never renders past the track duration.
    pub fn render(&mut self, buffer: &mut [f32]) -> RenderOutcome {
        if self.state != PlaybackState::Playing || self.ended {
            return RenderOutcome::Idle;
        }
        if let Some(reason) = self.deferred_failure.take() {
            let track_id = self.fail(&reason);
            return RenderOutcome::Failed { track_id, reason };
        }
        let Some(stream) = self.stream.as_mut() else {
            return RenderOutcome::Idle;
        };

        let channels = stream.channels().max(1);
        let sample_rate = stream.sample_rate();
        let mut wanted = buffer.len() / channels * channels;

        if self.duration > 0.0 {
            let remaining = self.duration - self.clock.position();
            let remaining_frames = (remaining * sample_rate as f64).ceil().max(0.0) as usize;
            wanted = wanted.min(remaining_frames * channels);
        }

        let mut filled = 0;
        let mut exhausted = wanted == 0;
        while filled < wanted {
            match stream.read(&mut buffer[filled..wanted]) {
                Ok(0) => {
                    exhausted = true;
                    break;
                }
                Ok(n) => filled += n,
                Err(e) if filled > 0 => {
                    self.deferred_failure = Some(e.to_string());
                    break;
                }
                Err(e) => {
                    let reason = e.to_string();
                    let track_id = self.fail(&reason);
                    return RenderOutcome::Failed { track_id, reason };
                }
            }
        }

        if filled > 0 {
            self.clock.advance((filled / channels) as u64, sample_rate);
            return RenderOutcome::Rendered(filled);
        }

        if exhausted {
            self.ended = true;
            if let Some(track) = &self.track {
                tracing::debug!(track_id = %track.id, position = self.position(), "End of track");
            }
            return RenderOutcome::EndOfTrack;
        }
        RenderOutcome::Idle
    }

    /// Tear down after a source failure, returning the failed track's id
    fn fail(&mut self, reason: &str) -> TrackId {
        self.stream = None;
        self.deferred_failure = None;
        self.state = PlaybackState::Stopped;
        self.clock.reset(0.0);
        self.ended = false;
        let track_id = self
            .track
            .take()
            .map_or_else(|| TrackId::new(""), |track| track.id);
        tracing::error!(track_id = %track_id, reason, "Source failed; transport stopped");
        track_id
    }

    fn failure(&mut self, reason: &str) -> PlaybackError {
        PlaybackError::SourceUnavailable {
            track_id: self.fail(reason),
            reason: reason.to_string(),
        }
    }
}
