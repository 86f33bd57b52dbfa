//! Queue coordinator driving a real engine with synthetic sources

use resonance_audio::test_utils::{MemoryResolver, ToneStream};
use resonance_audio::MemorySink;
use resonance_core::{
    CoreError, InMemoryLibraryStore, LibraryIndex, LibraryStore, StoreOperation, Track, TrackId,
};
use resonance_playback::{
    AudioEngine, BlockOutcome, EventKind, NavOutcome, PlaybackError, PlaybackEvent,
    PlaybackFailure, PlaybackState, Player, PlayerConfig, QueueManager, RepeatMode,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const RATE: u32 = 8_000;

type TestPlayer = Player<AudioEngine<MemorySink>>;

// ===== Test Helpers =====

/// Store whose writes can be switched to fail
struct FlakyStore {
    inner: InMemoryLibraryStore,
    failing: AtomicBool,
}

impl LibraryStore for FlakyStore {
    fn list_tracks(&self) -> resonance_core::Result<Vec<Track>> {
        self.inner.list_tracks()
    }

    fn increment_play_count(&self, id: &TrackId) -> resonance_core::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::store("backend offline"));
        }
        self.inner.increment_play_count(id)
    }

    fn set_favorite(&self, id: &TrackId, favorite: bool) -> resonance_core::Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::store("backend offline"));
        }
        self.inner.set_favorite(id, favorite)
    }

    fn add_track(&self, track: Track) -> resonance_core::Result<()> {
        self.inner.add_track(track)
    }
}

fn id(n: usize) -> TrackId {
    TrackId::new(format!("t{n}"))
}

fn player_with_store(durations: &[u64], store: Arc<dyn LibraryStore>) -> TestPlayer {
    let mut resolver = MemoryResolver::new();
    let library = Arc::new(LibraryIndex::new(store));

    for (i, &seconds) in durations.iter().enumerate() {
        let source = format!("tone-{i}");
        resolver.insert_tone(
            source.as_str(),
            ToneStream::new(440.0, Duration::from_secs(seconds), RATE, 2),
        );
        let track = Track::new(format!("Track {i}"), "Artist", "Album", source)
            .with_id(id(i))
            .with_duration_secs(seconds as f64)
            .unwrap();
        library.add_track(track).unwrap();
    }

    let mut config = PlayerConfig::default();
    config.playback.block_frames = 512;
    let engine = AudioEngine::new(Arc::new(resolver), MemorySink::new(RATE, 2), &config).unwrap();

    let mut player = Player::with_queue(engine, library, QueueManager::with_seed(7));
    player
        .set_queue((0..durations.len()).map(id).collect())
        .unwrap();
    player
}

fn player(durations: &[u64]) -> TestPlayer {
    player_with_store(durations, Arc::new(InMemoryLibraryStore::new()))
}

fn state(player: &TestPlayer) -> PlaybackState {
    player.transport().transport().state()
}

fn play_count(player: &TestPlayer, track: &TrackId) -> u32 {
    player.library().get(track).unwrap().play_count
}

/// Render until the engine reports the end of the active track
fn play_to_end(player: &mut TestPlayer) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    for _ in 0..10_000 {
        let engine = player.transport_mut();
        let outcome = engine.render_block().unwrap();
        let drained = engine.drain_events();
        let ended = drained
            .iter()
            .any(|e| matches!(e.kind, EventKind::TrackEnded { .. }));
        events.extend(drained);
        if ended {
            return events;
        }
        assert_ne!(outcome, BlockOutcome::Backpressure);
    }
    panic!("track never ended");
}

// ===== Navigation =====

#[test]
fn next_from_last_wraps_to_first() {
    let mut player = player(&[1, 1, 1]);
    player.set_repeat_mode(RepeatMode::All);
    player.select_track(&id(2)).unwrap();

    let outcome = player.next().unwrap();
    assert_eq!(
        outcome,
        NavOutcome::Playing {
            index: 0,
            track_id: id(0)
        }
    );
    assert_eq!(state(&player), PlaybackState::Playing);
}

#[test]
fn next_cycles_back_to_start() {
    let mut player = player(&[1, 1, 1]);
    player.select_track(&id(1)).unwrap();
    for _ in 0..3 {
        player.next().unwrap();
    }
    assert_eq!(player.queue().current(), Some(&id(1)));
}

#[test]
fn previous_from_first_wraps_to_last() {
    let mut player = player(&[1, 1, 1]);
    player.select_track(&id(0)).unwrap();
    assert_eq!(
        player.previous().unwrap(),
        NavOutcome::Playing {
            index: 2,
            track_id: id(2)
        }
    );
}

#[test]
fn auto_advance_stops_at_end_but_explicit_next_wraps() {
    let mut player = player(&[1, 1, 1]);
    player.set_repeat_mode(RepeatMode::Off);

    // Auto-advance off the last track halts
    player.select_track(&id(2)).unwrap();
    play_to_end(&mut player);
    assert_eq!(player.on_track_ended().unwrap(), NavOutcome::Stopped);
    assert_eq!(state(&player), PlaybackState::Stopped);

    // Explicit next from the same spot wraps and keeps playing
    player.select_track(&id(2)).unwrap();
    play_to_end(&mut player);
    assert_eq!(
        player.next().unwrap(),
        NavOutcome::Playing {
            index: 0,
            track_id: id(0)
        }
    );
    assert_eq!(state(&player), PlaybackState::Playing);
}

#[test]
fn auto_advance_moves_through_queue() {
    let mut player = player(&[1, 1]);
    player.select_track(&id(0)).unwrap();
    play_to_end(&mut player);

    assert_eq!(
        player.on_track_ended().unwrap(),
        NavOutcome::Playing {
            index: 1,
            track_id: id(1)
        }
    );
    let active = player.transport().transport().active_track().unwrap();
    assert_eq!(active.id, id(1));
    assert_eq!(player.transport().transport().position(), 0.0);
}

#[test]
fn repeat_all_auto_advance_wraps() {
    let mut player = player(&[1, 1]);
    player.set_repeat_mode(RepeatMode::All);
    player.select_track(&id(1)).unwrap();
    play_to_end(&mut player);

    assert_eq!(
        player.on_track_ended().unwrap(),
        NavOutcome::Playing {
            index: 0,
            track_id: id(0)
        }
    );
}

#[test]
fn repeat_one_replays_from_start() {
    let mut player = player(&[1, 1]);
    player.set_repeat_mode(RepeatMode::One);
    player.select_track(&id(0)).unwrap();
    play_to_end(&mut player);

    assert_eq!(
        player.on_track_ended().unwrap(),
        NavOutcome::Playing {
            index: 0,
            track_id: id(0)
        }
    );
    assert_eq!(state(&player), PlaybackState::Playing);
    assert_eq!(player.transport().transport().position(), 0.0);

    // The replayed track really plays again
    let events = play_to_end(&mut player);
    assert!(events
        .iter()
        .any(|e| matches!(e.kind, EventKind::Spectrum(_))));
}

#[test]
fn navigation_on_empty_queue_reports_empty() {
    let mut player = player(&[]);
    assert_eq!(player.next().unwrap(), NavOutcome::Empty);
    assert_eq!(player.previous().unwrap(), NavOutcome::Empty);
    assert_eq!(player.on_track_ended().unwrap(), NavOutcome::Empty);

    let events = player.drain_events();
    assert_eq!(
        events
            .iter()
            .filter(|e| e.kind == EventKind::QueueEmpty)
            .count(),
        3
    );
    assert_eq!(state(&player), PlaybackState::Stopped);
}

#[test]
fn queue_position_events_follow_navigation() {
    let mut player = player(&[1, 1, 1]);
    player.drain_events();
    player.select_track(&id(1)).unwrap();
    player.next().unwrap();

    let moves: Vec<_> = player
        .drain_events()
        .into_iter()
        .filter_map(|e| match e.kind {
            EventKind::QueuePositionChanged { index, track_id } => Some((index, track_id)),
            _ => None,
        })
        .collect();
    assert_eq!(moves, vec![(1, id(1)), (2, id(2))]);
}

// ===== Selection and bookkeeping =====

#[test]
fn selecting_twice_counts_two_plays() {
    let mut player = player(&[1, 1]);
    player.select_track(&id(0)).unwrap();
    player.select_track(&id(0)).unwrap();
    assert_eq!(play_count(&player, &id(0)), 2);
}

#[test]
fn pause_and_resume_do_not_count() {
    let mut player = player(&[1]);
    player.select_track(&id(0)).unwrap();
    player.pause().unwrap();
    assert_eq!(state(&player), PlaybackState::Paused);
    player.play().unwrap();
    assert_eq!(state(&player), PlaybackState::Playing);
    assert_eq!(play_count(&player, &id(0)), 1);
}

#[test]
fn navigation_does_not_count_plays() {
    let mut player = player(&[1, 1]);
    player.select_track(&id(0)).unwrap();
    player.next().unwrap();
    player.previous().unwrap();
    assert_eq!(play_count(&player, &id(0)), 1);
    assert_eq!(play_count(&player, &id(1)), 0);
}

#[test]
fn selecting_track_outside_queue_fails() {
    let mut player = player(&[1, 1]);
    player.set_queue(vec![id(0)]).unwrap();
    assert!(matches!(
        player.select_track(&id(1)),
        Err(PlaybackError::TrackNotInQueue(_))
    ));
    assert_eq!(play_count(&player, &id(1)), 0);
}

#[test]
fn selecting_unknown_track_fails() {
    let mut player = player(&[1]);
    assert!(matches!(
        player.select_track(&TrackId::new("nope")),
        Err(PlaybackError::Core(CoreError::TrackNotFound(_)))
    ));
}

#[test]
fn unavailable_source_stops_and_still_counts() {
    let mut player = player(&[1]);
    let broken = Track::new("Broken", "Artist", "Album", "missing-source").with_id("broken");
    player.library().add_track(broken).unwrap();
    player.enqueue(TrackId::new("broken"));

    let result = player.select_track(&TrackId::new("broken"));
    assert!(matches!(
        result,
        Err(PlaybackError::SourceUnavailable { .. })
    ));
    assert_eq!(state(&player), PlaybackState::Stopped);
    assert_eq!(play_count(&player, &TrackId::new("broken")), 1);

    let events = player.transport_mut().drain_events();
    assert!(events.iter().any(|e| matches!(
        &e.kind,
        EventKind::Failure(PlaybackFailure::SourceUnavailable { track_id, .. })
            if track_id.as_str() == "broken"
    )));
}

#[test]
fn store_failures_surface_as_events() {
    let store = Arc::new(FlakyStore {
        inner: InMemoryLibraryStore::new(),
        failing: AtomicBool::new(false),
    });
    let mut player = player_with_store(&[1], store.clone());
    store.failing.store(true, Ordering::SeqCst);

    player.select_track(&id(0)).unwrap();
    assert!(player.toggle_favorite(&id(0)).unwrap());

    // In-memory values stand
    let track = player.library().get(&id(0)).unwrap();
    assert_eq!(track.play_count, 1);
    assert!(track.favorite);

    let operations: Vec<_> = player
        .drain_events()
        .into_iter()
        .filter_map(|e| match e.kind {
            EventKind::Failure(PlaybackFailure::LibraryWriteFailed(failure)) => {
                Some(failure.operation)
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        operations,
        vec![StoreOperation::IncrementPlayCount, StoreOperation::SetFavorite]
    );
}

// ===== Transport passthrough =====

#[test]
fn seek_is_clamped_to_track_duration() {
    let mut player = player(&[200]);
    player.select_track(&id(0)).unwrap();

    player.seek(-5.0).unwrap();
    assert_eq!(player.transport().transport().position(), 0.0);

    player.seek(500.0).unwrap();
    assert_eq!(player.transport().transport().position(), 200.0);
}

#[test]
fn shuffle_does_not_interrupt_current_track() {
    let mut player = player(&[1, 1, 1, 1]);
    player.select_track(&id(2)).unwrap();
    player.transport_mut().render_block().unwrap();
    let position = player.transport().transport().position();

    player.set_shuffle(true);
    assert_eq!(player.queue().current(), Some(&id(2)));
    assert_eq!(player.queue().cursor(), Some(0));
    assert_eq!(state(&player), PlaybackState::Playing);
    assert_eq!(player.transport().transport().position(), position);

    player.set_shuffle(false);
    assert_eq!(player.queue().cursor(), Some(2));
}

#[test]
fn removing_current_track_stops_playback() {
    let mut player = player(&[1, 1]);
    player.select_track(&id(0)).unwrap();
    assert!(player.remove(&id(0)).unwrap());
    assert_eq!(state(&player), PlaybackState::Stopped);
    assert_eq!(player.queue().cursor(), None);
    assert!(!player.remove(&id(0)).unwrap());
}
