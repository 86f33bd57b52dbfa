//! Resonance Core
//!
//! Platform-agnostic domain types and the in-memory library view shared by the
//! audio and playback crates.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`, `SourceRef`
//! - **Collaborator Traits**: `LibraryStore` (the persistence backend)
//! - **Library Index**: read-mostly view with play-count/favorite authority
//! - **Error Handling**: unified `CoreError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use resonance_core::{InMemoryLibraryStore, LibraryIndex, Track};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryLibraryStore::new());
//! let library = LibraryIndex::new(store);
//!
//! let track = Track::new("Intro", "Band", "Debut", "/music/intro.flac");
//! let id = track.id.clone();
//! library.add_track(track).unwrap();
//!
//! library.record_play(&id).unwrap();
//! assert_eq!(library.get(&id).unwrap().play_count, 1);
//! ```

#![forbid(unsafe_code)]

pub mod error;
pub mod library;
pub mod query;
pub mod storage;
pub mod types;

pub use error::{CoreError, Result};
pub use library::{LibraryIndex, StoreFailure, StoreOperation};
pub use query::{LibraryFilter, LibraryStats, SortKey};
pub use storage::{InMemoryLibraryStore, LibraryStore};
pub use types::{SourceRef, Track, TrackId};
