//! Queue coordinator
//!
//! `Player` ties the queue, the library index and a transport together. It
//! decides what plays (selection, explicit navigation, auto-advance), asks the
//! library to record selections, and reports queue-side events. It holds no
//! playback state of its own; the transport and queue own theirs.

use crate::engine::TransportControl;
use crate::error::Result;
use crate::events::{EventKind, PlaybackEvent, PlaybackFailure};
use crate::queue::{AutoAdvance, QueueManager};
use crate::types::RepeatMode;
use resonance_core::{CoreError, LibraryIndex, TrackId};
use std::sync::Arc;

/// Result of a navigation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavOutcome {
    /// The track at `index` of the active ordering was loaded and started
    Playing { index: usize, track_id: TrackId },
    /// End of queue under repeat-off; the transport was stopped
    Stopped,
    /// The queue is empty; nothing changed
    Empty,
}

/// Coordinates queue, library and transport
pub struct Player<T: TransportControl> {
    transport: T,
    queue: QueueManager,
    library: Arc<LibraryIndex>,
    events: Vec<PlaybackEvent>,
}

impl<T: TransportControl> Player<T> {
    pub fn new(transport: T, library: Arc<LibraryIndex>) -> Self {
        Self::with_queue(transport, library, QueueManager::new())
    }

    /// Use a preconfigured queue (seeded shuffles, restored sessions)
    pub fn with_queue(transport: T, library: Arc<LibraryIndex>, queue: QueueManager) -> Self {
        Self {
            transport,
            queue,
            library,
            events: Vec::new(),
        }
    }

    pub fn queue(&self) -> &QueueManager {
        &self.queue
    }

    pub fn library(&self) -> &Arc<LibraryIndex> {
        &self.library
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Explicitly select a track: load it, play it, count the play
    ///
    /// The play is counted before the source is opened, so a selection whose
    /// source turns out to be unavailable still counts.
    pub fn select_track(&mut self, id: &TrackId) -> Result<NavOutcome> {
        if !self.library.contains(id) {
            return Err(CoreError::TrackNotFound(id.clone()).into());
        }
        let index = self.queue.select(id)?;

        let play_count = self.library.record_play(id)?;
        tracing::debug!(track_id = %id, play_count, "Track selected");
        self.collect_store_failures();

        self.start(index, id.clone())
    }

    /// Explicit next; always wraps
    pub fn next(&mut self) -> Result<NavOutcome> {
        match self.queue.next() {
            Some((index, track_id)) => self.start(index, track_id),
            None => Ok(self.empty()),
        }
    }

    /// Explicit previous; always wraps
    pub fn previous(&mut self) -> Result<NavOutcome> {
        match self.queue.previous() {
            Some((index, track_id)) => self.start(index, track_id),
            None => Ok(self.empty()),
        }
    }

    /// React to the transport's end-of-track event
    pub fn on_track_ended(&mut self) -> Result<NavOutcome> {
        if self.queue.is_empty() {
            return Ok(self.empty());
        }
        match self.queue.on_track_ended() {
            AutoAdvance::Replay { index, track_id } | AutoAdvance::Advance { index, track_id } => {
                self.start(index, track_id)
            }
            AutoAdvance::Stop => {
                tracing::debug!("End of queue; stopping");
                self.transport.stop()?;
                Ok(NavOutcome::Stopped)
            }
        }
    }

    pub fn set_shuffle(&mut self, enabled: bool) {
        self.queue.set_shuffle(enabled);
        self.emit_position();
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.queue.set_repeat_mode(mode);
    }

    /// Replace the queue; stops playback if the current track left it
    pub fn set_queue(&mut self, tracks: Vec<TrackId>) -> Result<()> {
        let had_current = self.queue.current().is_some();
        self.queue.set_tracks(tracks);
        if had_current && self.queue.current().is_none() {
            self.transport.stop()?;
        }
        self.emit_position();
        Ok(())
    }

    /// Append a track to the queue
    pub fn enqueue(&mut self, id: TrackId) {
        self.queue.push(id);
        self.emit_position();
    }

    /// Remove a track from the queue; removing the current track stops it
    pub fn remove(&mut self, id: &TrackId) -> Result<bool> {
        let was_current = self.queue.current() == Some(id);
        if !self.queue.remove(id) {
            return Ok(false);
        }
        if was_current {
            self.transport.stop()?;
        }
        self.emit_position();
        Ok(true)
    }

    /// Flip a track's favorite flag through the library
    pub fn toggle_favorite(&mut self, id: &TrackId) -> Result<bool> {
        let favorite = self.library.toggle_favorite(id)?;
        self.collect_store_failures();
        Ok(favorite)
    }

    /// Resume or start the loaded track; does not count a play
    pub fn play(&mut self) -> Result<()> {
        self.transport.play()
    }

    pub fn pause(&mut self) -> Result<()> {
        self.transport.pause()
    }

    pub fn stop(&mut self) -> Result<()> {
        self.transport.stop()
    }

    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        self.transport.seek(seconds)
    }

    /// Take queue and library events raised since the last call
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        self.collect_store_failures();
        std::mem::take(&mut self.events)
    }

    fn start(&mut self, index: usize, track_id: TrackId) -> Result<NavOutcome> {
        let track = self
            .library
            .get(&track_id)
            .ok_or_else(|| CoreError::TrackNotFound(track_id.clone()))?;

        self.emit(EventKind::QueuePositionChanged {
            index,
            track_id: track_id.clone(),
        });
        self.transport.load_track(track)?;
        self.transport.play()?;
        Ok(NavOutcome::Playing { index, track_id })
    }

    fn empty(&mut self) -> NavOutcome {
        tracing::debug!("Navigation on empty queue");
        self.emit(EventKind::QueueEmpty);
        NavOutcome::Empty
    }

    /// Report where the cursor sits after a queue mutation
    fn emit_position(&mut self) {
        if let (Some(index), Some(track_id)) = (self.queue.cursor(), self.queue.current()) {
            let track_id = track_id.clone();
            self.emit(EventKind::QueuePositionChanged { index, track_id });
        }
    }

    fn collect_store_failures(&mut self) {
        for failure in self.library.take_store_failures() {
            self.emit(EventKind::Failure(PlaybackFailure::LibraryWriteFailed(
                failure,
            )));
        }
    }

    fn emit(&mut self, kind: EventKind) {
        self.events.push(PlaybackEvent::now(kind));
    }
}
