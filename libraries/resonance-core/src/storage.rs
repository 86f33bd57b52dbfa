//! Library store collaborator
//!
//! The persistence backend is external. The core only forwards writes to it and
//! reads the full catalog on reload.

use crate::error::{CoreError, Result};
use crate::types::{Track, TrackId};
use std::sync::{Mutex, PoisonError};

/// Persistence backend for the track catalog
///
/// Implementations may be eventually consistent: a write is not required to be
/// visible to a `list_tracks` call racing with it.
pub trait LibraryStore: Send + Sync {
    /// Load every track in the catalog
    fn list_tracks(&self) -> Result<Vec<Track>>;

    /// Increment the stored play count of a track
    fn increment_play_count(&self, id: &TrackId) -> Result<()>;

    /// Persist the favorite flag of a track
    fn set_favorite(&self, id: &TrackId, favorite: bool) -> Result<()>;

    /// Persist a new track
    fn add_track(&self, track: Track) -> Result<()>;
}

/// Store that keeps the catalog in process memory
///
/// Used by the CLI (which has no persistent catalog) and by tests.
#[derive(Debug, Default)]
pub struct InMemoryLibraryStore {
    tracks: Mutex<Vec<Track>>,
}

impl InMemoryLibraryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with tracks
    pub fn with_tracks(tracks: Vec<Track>) -> Self {
        Self {
            tracks: Mutex::new(tracks),
        }
    }

    fn update<F>(&self, id: &TrackId, f: F) -> Result<()>
    where
        F: FnOnce(&mut Track),
    {
        let mut tracks = self.tracks.lock().unwrap_or_else(PoisonError::into_inner);
        let track = tracks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| CoreError::TrackNotFound(id.clone()))?;
        f(track);
        Ok(())
    }
}

impl LibraryStore for InMemoryLibraryStore {
    fn list_tracks(&self) -> Result<Vec<Track>> {
        Ok(self
            .tracks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn increment_play_count(&self, id: &TrackId) -> Result<()> {
        self.update(id, |track| track.play_count = track.play_count.saturating_add(1))
    }

    fn set_favorite(&self, id: &TrackId, favorite: bool) -> Result<()> {
        self.update(id, |track| track.favorite = favorite)
    }

    fn add_track(&self, track: Track) -> Result<()> {
        let mut tracks = self.tracks.lock().unwrap_or_else(PoisonError::into_inner);
        if tracks.iter().any(|t| t.id == track.id) {
            return Err(CoreError::Duplicate(track.id.to_string()));
        }
        tracks.push(track);
        Ok(())
    }
}
