//! In-memory library index
//!
//! The index is the read path for every consumer and the only place where play
//! counts and favorite flags change. Writes are applied in memory first, then
//! forwarded to the `LibraryStore`. A failed forward is recorded and reported,
//! never rolled back.

use crate::error::{CoreError, Result};
use crate::query::{self, LibraryFilter, LibraryStats, SortKey};
use crate::storage::LibraryStore;
use crate::types::{Track, TrackId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Store write that was attempted on behalf of the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreOperation {
    IncrementPlayCount,
    SetFavorite,
}

/// A store write that failed after the in-memory value was updated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreFailure {
    pub track_id: TrackId,
    pub operation: StoreOperation,
    pub message: String,
}

/// Read-mostly view of the track catalog
pub struct LibraryIndex {
    store: Arc<dyn LibraryStore>,
    tracks: RwLock<Vec<Track>>,
    failures: Mutex<Vec<StoreFailure>>,
}

impl LibraryIndex {
    /// Create an empty index backed by `store`
    ///
    /// Call [`LibraryIndex::reload`] to pull the existing catalog.
    pub fn new(store: Arc<dyn LibraryStore>) -> Self {
        Self {
            store,
            tracks: RwLock::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Create an index and load the catalog from `store`
    pub fn load(store: Arc<dyn LibraryStore>) -> Result<Self> {
        let index = Self::new(store);
        index.reload()?;
        Ok(index)
    }

    /// Replace the in-memory view with the store's catalog
    ///
    /// Returns the number of tracks loaded.
    pub fn reload(&self) -> Result<usize> {
        let tracks = self.store.list_tracks()?;
        let count = tracks.len();
        *self.write() = tracks;
        tracing::debug!(count, "Library reloaded");
        Ok(count)
    }

    /// Add a track to the store and the index
    ///
    /// The id is claimed in the index before the store is written, so
    /// concurrent adds of one id insert it once. A rejected store write
    /// removes the claimed entry again.
    pub fn add_track(&self, track: Track) -> Result<()> {
        {
            let mut tracks = self.write();
            if tracks.iter().any(|t| t.id == track.id) {
                return Err(CoreError::Duplicate(track.id.to_string()));
            }
            tracks.push(track.clone());
        }

        if let Err(e) = self.store.add_track(track.clone()) {
            self.write().retain(|t| t.id != track.id);
            return Err(e);
        }
        tracing::debug!(track_id = %track.id, title = %track.title, "Track added");
        Ok(())
    }

    /// Record an explicit selection of a track
    ///
    /// Returns the new in-memory play count.
    pub fn record_play(&self, id: &TrackId) -> Result<u32> {
        let count = {
            let mut tracks = self.write();
            let track = find_mut(&mut tracks, id)?;
            track.play_count = track.play_count.saturating_add(1);
            track.play_count
        };

        if let Err(e) = self.store.increment_play_count(id) {
            self.record_failure(id, StoreOperation::IncrementPlayCount, &e);
        }
        Ok(count)
    }

    /// Set the favorite flag of a track
    pub fn set_favorite(&self, id: &TrackId, favorite: bool) -> Result<()> {
        {
            let mut tracks = self.write();
            find_mut(&mut tracks, id)?.favorite = favorite;
        }

        if let Err(e) = self.store.set_favorite(id, favorite) {
            self.record_failure(id, StoreOperation::SetFavorite, &e);
        }
        Ok(())
    }

    /// Flip the favorite flag, returning the new value
    pub fn toggle_favorite(&self, id: &TrackId) -> Result<bool> {
        let favorite = {
            let mut tracks = self.write();
            let track = find_mut(&mut tracks, id)?;
            track.favorite = !track.favorite;
            track.favorite
        };

        if let Err(e) = self.store.set_favorite(id, favorite) {
            self.record_failure(id, StoreOperation::SetFavorite, &e);
        }
        Ok(favorite)
    }

    /// Drain store failures recorded since the last call
    pub fn take_store_failures(&self) -> Vec<StoreFailure> {
        std::mem::take(&mut *self.failures.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn get(&self, id: &TrackId) -> Option<Track> {
        self.read().iter().find(|t| &t.id == id).cloned()
    }

    pub fn contains(&self, id: &TrackId) -> bool {
        self.read().iter().any(|t| &t.id == id)
    }

    /// Snapshot of every track, in insertion order
    pub fn tracks(&self) -> Vec<Track> {
        self.read().clone()
    }

    /// Ids of every track, in insertion order
    pub fn track_ids(&self) -> Vec<TrackId> {
        self.read().iter().map(|t| t.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // ===== Queries =====

    /// Case-insensitive match on title, artist or album
    pub fn search(&self, text: &str) -> Vec<Track> {
        query::search(&self.read(), text)
    }

    pub fn filter(&self, filter: LibraryFilter, now: DateTime<Utc>) -> Vec<Track> {
        query::filter(&self.read(), filter, now)
    }

    pub fn sorted(&self, key: SortKey) -> Vec<Track> {
        query::sorted(&self.read(), key)
    }

    pub fn most_played(&self, limit: usize) -> Vec<Track> {
        query::most_played(&self.read(), limit)
    }

    pub fn recently_added(&self, limit: usize) -> Vec<Track> {
        query::recently_added(&self.read(), limit)
    }

    pub fn stats(&self) -> LibraryStats {
        LibraryStats::collect(&self.read())
    }

    fn record_failure(&self, id: &TrackId, operation: StoreOperation, error: &CoreError) {
        tracing::warn!(
            track_id = %id,
            ?operation,
            error = %error,
            "Library store write failed; keeping in-memory value"
        );
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoreFailure {
                track_id: id.clone(),
                operation,
                message: error.to_string(),
            });
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Track>> {
        self.tracks.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Track>> {
        self.tracks.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for LibraryIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LibraryIndex")
            .field("tracks", &self.len())
            .finish_non_exhaustive()
    }
}

fn find_mut<'a>(tracks: &'a mut [Track], id: &TrackId) -> Result<&'a mut Track> {
    tracks
        .iter_mut()
        .find(|t| &t.id == id)
        .ok_or_else(|| CoreError::TrackNotFound(id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryLibraryStore;

    fn track(id: &str) -> Track {
        Track::new(format!("Song {id}"), "Artist", "Album", format!("/music/{id}.mp3")).with_id(id)
    }

    fn index_with(ids: &[&str]) -> LibraryIndex {
        let store = InMemoryLibraryStore::with_tracks(ids.iter().map(|id| track(id)).collect());
        LibraryIndex::load(Arc::new(store)).unwrap()
    }

    #[test]
    fn load_reads_store() {
        let index = index_with(&["a", "b"]);
        assert_eq!(index.len(), 2);
        assert!(index.contains(&TrackId::new("b")));
    }

    #[test]
    fn record_play_increments() {
        let index = index_with(&["a"]);
        let id = TrackId::new("a");

        assert_eq!(index.record_play(&id).unwrap(), 1);
        assert_eq!(index.record_play(&id).unwrap(), 2);
        assert_eq!(index.get(&id).unwrap().play_count, 2);
        assert!(index.take_store_failures().is_empty());
    }

    #[test]
    fn record_play_unknown_track() {
        let index = index_with(&[]);
        let result = index.record_play(&TrackId::new("nope"));
        assert!(matches!(result, Err(CoreError::TrackNotFound(_))));
    }

    #[test]
    fn toggle_favorite_round_trip() {
        let index = index_with(&["a"]);
        let id = TrackId::new("a");

        assert!(index.toggle_favorite(&id).unwrap());
        assert!(index.get(&id).unwrap().favorite);
        assert!(!index.toggle_favorite(&id).unwrap());
        assert!(!index.get(&id).unwrap().favorite);
    }

    #[test]
    fn add_duplicate_rejected() {
        let index = index_with(&["a"]);
        assert!(matches!(
            index.add_track(track("a")),
            Err(CoreError::Duplicate(_))
        ));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn reload_sees_store_writes() {
        let store = Arc::new(InMemoryLibraryStore::with_tracks(vec![track("a")]));
        let index = LibraryIndex::load(store.clone()).unwrap();
        index.record_play(&TrackId::new("a")).unwrap();

        store.add_track(track("b")).unwrap();
        assert_eq!(index.reload().unwrap(), 2);
        assert_eq!(index.get(&TrackId::new("a")).unwrap().play_count, 1);
    }
}
