//! Resonance Playback
//!
//! Transport, queue navigation and the real-time engine for Resonance.
//!
//! This crate provides:
//! - Transport state machine (play/pause/stop/seek, end-of-track detection)
//! - Queue manager (wraparound navigation, shuffle permutations, repeat modes)
//! - Audio engine (transport → equalizer → spectrum → volume → sink) that can
//!   run on a dedicated audio thread behind bounded command/event queues
//! - Player coordinator (selection, auto-advance, play-count bookkeeping)
//! - Configuration loading (file + `RESONANCE_*` environment)
//!
//! # Architecture
//!
//! Decoding and output are collaborators: the engine reads from any
//! `SourceResolver` and writes to any `OutputSink` from `resonance-audio`,
//! and the player reads tracks from a `LibraryIndex` in `resonance-core`.
//!
//! # Example
//!
//! ```rust
//! use resonance_audio::{FileResolver, NullSink};
//! use resonance_core::{InMemoryLibraryStore, LibraryIndex};
//! use resonance_playback::{AudioEngine, Player, PlayerConfig, RepeatMode};
//! use std::sync::Arc;
//!
//! let config = PlayerConfig::default();
//! let engine = AudioEngine::new(
//!     Arc::new(FileResolver::new()),
//!     NullSink::new(44_100, 2),
//!     &config,
//! )
//! .unwrap();
//!
//! let library = Arc::new(LibraryIndex::new(Arc::new(InMemoryLibraryStore::new())));
//! let mut player = Player::new(engine, library);
//! player.set_repeat_mode(RepeatMode::All);
//! assert!(player.queue().is_empty());
//! ```

mod config;
mod engine;
mod error;
mod events;
mod player;
mod queue;
mod shuffle;
mod transport;
pub mod types;
mod volume;

pub use crate::config::{EngineSettings, EqualizerSettings, PlaybackSettings, PlayerConfig};
pub use engine::{AudioEngine, BlockOutcome, EngineCommand, EngineHandle, TransportControl};
pub use error::{PlaybackError, Result};
pub use events::{EventKind, PlaybackEvent, PlaybackFailure};
pub use player::{NavOutcome, Player};
pub use queue::{AutoAdvance, QueueManager};
pub use transport::{RenderOutcome, Transport};
pub use types::{PlaybackState, RepeatMode};
pub use volume::Volume;
