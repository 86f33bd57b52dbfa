/// Resonance - command-line audio player
use anyhow::Context;
use clap::{Parser, Subcommand};
use resonance_audio::decoder::is_supported_file;
use resonance_audio::effects::EqPreset;
use resonance_audio::{CpalSink, FileResolver, OutputSink};
use resonance_core::{InMemoryLibraryStore, LibraryIndex, Track};
use resonance_playback::{
    AudioEngine, EngineHandle, EventKind, NavOutcome, PlaybackEvent, PlaybackFailure, Player,
    PlayerConfig, RepeatMode,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How long the control loop waits for an engine event
const EVENT_POLL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "resonance")]
#[command(about = "Resonance command-line audio player", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play audio files, or every audio file in a directory
    Play {
        /// Files or directories to queue
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Shuffle the queue
        #[arg(long)]
        shuffle: bool,
        /// Repeat mode: off, one or all
        #[arg(long)]
        repeat: Option<RepeatMode>,
        /// Equalizer preset (see `resonance presets`)
        #[arg(long)]
        preset: Option<EqPreset>,
        /// Volume, 0-100
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        volume: Option<u8>,
        /// Configuration file path
        #[arg(short, long, env = "RESONANCE_CONFIG")]
        config: Option<PathBuf>,
    },
    /// List equalizer presets
    Presets,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resonance=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play {
            paths,
            shuffle,
            repeat,
            preset,
            volume,
            config,
        } => {
            let mut config =
                PlayerConfig::load(config.as_deref()).context("Failed to load configuration")?;
            config.playback.shuffle |= shuffle;
            if let Some(repeat) = repeat {
                config.playback.repeat = repeat;
            }
            if let Some(preset) = preset {
                config.equalizer.preset = preset;
                config.equalizer.bass_boost_db = None;
            }
            if let Some(volume) = volume {
                config.playback.volume = volume;
            }
            play(&paths, &config)?;
        }
        Commands::Presets => list_presets(),
    }

    Ok(())
}

fn list_presets() {
    for preset in EqPreset::ALL {
        let gains: Vec<String> = preset.gains().iter().map(|g| format!("{g:+}")).collect();
        println!("{:<14} {:<14} [{}]", preset.id(), preset.name(), gains.join(", "));
    }
}

fn play(paths: &[PathBuf], config: &PlayerConfig) -> anyhow::Result<()> {
    config.validate().context("Invalid configuration")?;

    let files = collect_files(paths)?;
    if files.is_empty() {
        anyhow::bail!("No playable audio files found");
    }

    let library = Arc::new(LibraryIndex::new(Arc::new(InMemoryLibraryStore::new())));
    let mut queue = Vec::with_capacity(files.len());
    for path in &files {
        let track = track_for(path);
        queue.push(track.id.clone());
        library
            .add_track(track)
            .with_context(|| format!("Failed to add {}", path.display()))?;
    }
    tracing::info!(tracks = queue.len(), "Library built");

    let sink = CpalSink::open_default().context("Failed to open audio output")?;
    let resolver = Arc::new(FileResolver::with_output_sample_rate(sink.sample_rate()));
    let engine = AudioEngine::new(resolver, sink, config).context("Failed to create engine")?;
    let handle = engine
        .spawn(config.engine.command_capacity, config.engine.event_capacity)
        .context("Failed to start audio thread")?;

    let mut player = Player::new(handle, library);
    player.set_repeat_mode(config.playback.repeat);
    player.set_queue(queue)?;
    player.set_shuffle(config.playback.shuffle);

    let first = player
        .queue()
        .ordered()
        .next()
        .cloned()
        .context("Queue is empty")?;
    player.select_track(&first)?;

    run(&mut player)
}

/// Files as given, plus supported files one level inside each directory
fn collect_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("Failed to read directory {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_supported_file(p))
                .collect();
            found.sort();
            tracing::debug!(dir = %path.display(), files = found.len(), "Scanned directory");
            files.extend(found);
        } else if is_supported_file(path) {
            files.push(path.clone());
        } else {
            tracing::warn!(path = %path.display(), "Skipping unsupported file");
        }
    }
    Ok(files)
}

fn track_for(path: &Path) -> Track {
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Track::new(
        title,
        "Unknown Artist",
        "Unknown Album",
        path.to_string_lossy().into_owned(),
    )
}

/// Drive auto-advance until the queue runs out
fn run(player: &mut Player<EngineHandle>) -> anyhow::Result<()> {
    let mut failures = 0usize;

    loop {
        for event in player.drain_events() {
            log_event(player, &event);
        }

        let Some(event) = player.transport().recv_event_timeout(EVENT_POLL)? else {
            continue;
        };
        log_event(player, &event);

        let outcome = match event.kind {
            EventKind::TrackLoaded { .. } => {
                failures = 0;
                continue;
            }
            EventKind::TrackEnded { .. } => player.on_track_ended()?,
            EventKind::Failure(PlaybackFailure::SourceUnavailable { .. }) => {
                failures += 1;
                if failures >= player.queue().len() {
                    anyhow::bail!("No track in the queue could be played");
                }
                // Skip rather than replay a broken track
                if player.queue().repeat_mode() == RepeatMode::One {
                    player.next()?
                } else {
                    player.on_track_ended()?
                }
            }
            _ => continue,
        };

        if matches!(outcome, NavOutcome::Stopped | NavOutcome::Empty) {
            tracing::info!("Queue finished");
            return Ok(());
        }
    }
}

fn log_event(player: &Player<EngineHandle>, event: &PlaybackEvent) {
    match &event.kind {
        EventKind::StateChanged { state } => tracing::info!(%state, "Playback state"),
        EventKind::TrackLoaded {
            track_id,
            duration_secs,
        } => {
            let title = player
                .library()
                .get(track_id)
                .map(|t| t.title)
                .unwrap_or_default();
            tracing::info!(track_id = %track_id, %title, duration_secs, "Now playing");
        }
        EventKind::PositionUpdate {
            position_secs,
            duration_secs,
        } => tracing::debug!(position_secs, duration_secs, "Position"),
        EventKind::Spectrum(frame) => {
            let peak = frame.magnitudes().iter().copied().fold(0.0_f32, f32::max);
            tracing::trace!(timestamp = frame.timestamp(), peak, "Spectrum");
        }
        EventKind::TrackEnded { track_id } => tracing::debug!(track_id = %track_id, "Track ended"),
        EventKind::QueuePositionChanged { index, track_id } => {
            tracing::debug!(index, track_id = %track_id, "Queue position");
        }
        EventKind::QueueEmpty => tracing::info!("Queue is empty"),
        EventKind::EqualizerChanged(settings) => {
            tracing::info!(preset = settings.preset_label(), enabled = settings.enabled, "Equalizer");
        }
        EventKind::VolumeChanged { level, muted } => tracing::info!(level, muted, "Volume"),
        EventKind::Failure(PlaybackFailure::SourceUnavailable { track_id, reason }) => {
            tracing::error!(track_id = %track_id, %reason, "Cannot play track");
        }
        EventKind::Failure(PlaybackFailure::LibraryWriteFailed(failure)) => {
            tracing::warn!(
                track_id = %failure.track_id,
                operation = ?failure.operation,
                message = %failure.message,
                "Library write failed"
            );
        }
    }
}
