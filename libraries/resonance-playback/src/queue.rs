//! Queue manager
//!
//! Owns the play order, the shuffle permutation, the cursor and the repeat
//! policy. The cursor is a position in the *active* ordering (shuffled or
//! natural) and is always either `None` or a valid position.
//!
//! ```text
//! tracks (natural):  [A, B, C, D]
//! order (shuffled):  [2, 0, 3, 1]   → C, A, D, B
//! cursor:            Some(1)        → A
//! ```

use crate::error::{PlaybackError, Result};
use crate::shuffle;
use crate::types::RepeatMode;
use rand::rngs::StdRng;
use rand::SeedableRng;
use resonance_core::TrackId;

/// What to do when the active track ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoAdvance {
    /// Repeat-one: play the same track again from 0
    Replay { index: usize, track_id: TrackId },
    /// Move on to the track at `index`
    Advance { index: usize, track_id: TrackId },
    /// End of queue under repeat-off, or nothing current
    Stop,
}

/// Ordering, shuffle and repeat state for the play queue
#[derive(Debug, Clone)]
pub struct QueueManager {
    /// Natural order
    tracks: Vec<TrackId>,
    /// Active ordering as natural indices
    order: Vec<usize>,
    /// Position in `order`
    cursor: Option<usize>,
    shuffle: bool,
    repeat: RepeatMode,
    rng: StdRng,
}

impl QueueManager {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic shuffles for tests and reproducible sessions
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            tracks: Vec::new(),
            order: Vec::new(),
            cursor: None,
            shuffle: false,
            repeat: RepeatMode::Off,
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Tracks in natural order
    pub fn tracks(&self) -> &[TrackId] {
        &self.tracks
    }

    /// Tracks in the active ordering
    pub fn ordered(&self) -> impl Iterator<Item = &TrackId> + '_ {
        self.order.iter().map(|&i| &self.tracks[i])
    }

    /// Cursor position in the active ordering
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn current(&self) -> Option<&TrackId> {
        self.cursor.map(|c| &self.tracks[self.order[c]])
    }

    pub fn is_shuffled(&self) -> bool {
        self.shuffle
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        tracing::debug!(%mode, "Repeat mode set");
        self.repeat = mode;
    }

    /// Replace the queue contents
    ///
    /// If the current track is still present it stays current.
    pub fn set_tracks(&mut self, tracks: Vec<TrackId>) {
        let current = self.current().cloned();
        self.tracks = tracks;
        let natural = current.and_then(|id| self.tracks.iter().position(|t| *t == id));
        self.regenerate(natural);
    }

    /// Append a track to the end of the natural order
    pub fn push(&mut self, id: TrackId) {
        let natural = self.current_natural();
        self.tracks.push(id);
        self.regenerate(natural);
    }

    /// Remove the first occurrence of `id`
    ///
    /// Removing the current track clears the cursor. Returns whether anything
    /// was removed.
    pub fn remove(&mut self, id: &TrackId) -> bool {
        let Some(removed) = self.tracks.iter().position(|t| t == id) else {
            return false;
        };
        let natural = match self.current_natural() {
            Some(n) if n == removed => None,
            Some(n) if n > removed => Some(n - 1),
            other => other,
        };
        self.tracks.remove(removed);
        self.regenerate(natural);
        true
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
        self.order.clear();
        self.cursor = None;
    }

    /// Point the cursor at `id` in the active ordering
    pub fn select(&mut self, id: &TrackId) -> Result<usize> {
        let position = self
            .ordered()
            .position(|t| t == id)
            .ok_or_else(|| PlaybackError::TrackNotInQueue(id.clone()))?;
        self.cursor = Some(position);
        Ok(position)
    }

    /// Advance with wraparound; `None` on an empty queue
    ///
    /// Explicit navigation always wraps, whatever the repeat mode.
    pub fn next(&mut self) -> Option<(usize, TrackId)> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let position = self.cursor.map_or(0, |c| (c + 1) % len);
        Some(self.move_to(position))
    }

    /// Retreat with wraparound; `None` on an empty queue
    pub fn previous(&mut self) -> Option<(usize, TrackId)> {
        let len = self.len();
        if len == 0 {
            return None;
        }
        let position = self.cursor.map_or(len - 1, |c| (c + len - 1) % len);
        Some(self.move_to(position))
    }

    /// Decide what follows the track that just ended
    pub fn on_track_ended(&mut self) -> AutoAdvance {
        let Some(cursor) = self.cursor else {
            return AutoAdvance::Stop;
        };
        match self.repeat {
            RepeatMode::One => AutoAdvance::Replay {
                index: cursor,
                track_id: self.tracks[self.order[cursor]].clone(),
            },
            RepeatMode::Off if cursor + 1 >= self.len() => AutoAdvance::Stop,
            RepeatMode::Off | RepeatMode::All => match self.next() {
                Some((index, track_id)) => AutoAdvance::Advance { index, track_id },
                None => AutoAdvance::Stop,
            },
        }
    }

    /// Switch shuffle on or off
    ///
    /// Turning it on draws a fresh permutation with the current track pinned
    /// at the front; turning it off restores natural order and moves the
    /// cursor to the current track's natural index.
    pub fn set_shuffle(&mut self, enabled: bool) {
        let natural = self.current_natural();
        self.shuffle = enabled;
        self.regenerate(natural);
    }

    fn current_natural(&self) -> Option<usize> {
        self.cursor.map(|c| self.order[c])
    }

    fn move_to(&mut self, position: usize) -> (usize, TrackId) {
        self.cursor = Some(position);
        (position, self.tracks[self.order[position]].clone())
    }

    /// Rebuild the active ordering, keeping `current` (a natural index) current
    fn regenerate(&mut self, current: Option<usize>) {
        let len = self.tracks.len();
        if self.shuffle {
            self.order = match current {
                Some(n) => shuffle::pinned_first(len, n, &mut self.rng),
                None => shuffle::derangement(len, &mut self.rng),
            };
            self.cursor = current.map(|_| 0);
            tracing::debug!(len, "Shuffle order regenerated");
        } else {
            self.order = (0..len).collect();
            self.cursor = current;
        }
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new()
    }
}
