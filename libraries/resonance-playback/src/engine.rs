//! Audio engine
//!
//! Renders the signal path one block at a time:
//!
//! ```text
//! Transport ─▶ Equalizer ─▶ Spectrum tap ─▶ Volume ─▶ OutputSink
//! ```
//!
//! The engine can be driven directly (`render_block`, tests and offline use)
//! or moved onto a dedicated audio thread with [`AudioEngine::spawn`]. On the
//! thread, commands arrive through a bounded crossbeam channel and are applied
//! only between blocks; events leave through a second bounded channel and the
//! audio thread never blocks on either.

use crate::config::PlayerConfig;
use crate::error::{PlaybackError, Result};
use crate::events::{EventKind, PlaybackEvent, PlaybackFailure};
use crate::transport::{RenderOutcome, Transport};
use crate::types::PlaybackState;
use crate::volume::Volume;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use resonance_audio::effects::{AudioEffect, EqPreset, EqSettings, Equalizer};
use resonance_audio::{AudioError, OutputSink, SourceResolver, SpectrumAnalyzer};
use resonance_core::Track;
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Most interleaved channels a stream may carry through the engine
const MAX_CHANNELS: usize = 8;

/// Wait between polls while nothing is playing
const IDLE_WAIT: Duration = Duration::from_millis(10);

/// Wait before re-offering audio to a full sink
const BACKPRESSURE_WAIT: Duration = Duration::from_millis(2);

/// Commands from the control path
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Load(Track),
    Play,
    Pause,
    Stop,
    Seek(f64),
    SetBandGain { band: usize, gain_db: f32 },
    SetBassBoost(f32),
    SetPreset(EqPreset),
    SetEqualizerEnabled(bool),
    ApplyEqualizer(EqSettings),
    ResetEqualizer,
    SetVolume(u8),
    SetMuted(bool),
    Shutdown,
}

/// What one call to [`AudioEngine::render_block`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockOutcome {
    /// A block went through the signal path
    Rendered,
    /// The sink is full; the held-back remainder was not fully accepted
    Backpressure,
    /// Nothing to render
    Idle,
}

/// Control surface the queue coordinator drives
///
/// Implemented directly by [`AudioEngine`] and, through the command channel,
/// by [`EngineHandle`]. Over the channel, source failures surface as events
/// rather than return values.
pub trait TransportControl {
    fn load_track(&mut self, track: Track) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    fn seek(&mut self, seconds: f64) -> Result<()>;
}

/// Transport plus signal path and output
pub struct AudioEngine<S: OutputSink> {
    transport: Transport,
    equalizer: Equalizer,
    analyzer: SpectrumAnalyzer,
    volume: Volume,
    sink: S,

    block_frames: usize,
    /// Decoded block in stream format
    block: Vec<f32>,
    /// Remixed block in sink format
    output: Vec<f32>,
    /// Part of `output` the sink has not accepted yet
    pending: std::ops::Range<usize>,

    position_interval: f64,
    last_position_report: f64,
    events: VecDeque<PlaybackEvent>,
}

impl<S: OutputSink> AudioEngine<S> {
    pub fn new(resolver: Arc<dyn SourceResolver>, sink: S, config: &PlayerConfig) -> Result<Self> {
        config.validate()?;

        let equalizer = Equalizer::with_settings(&config.equalizer.to_eq_settings())?;
        let analyzer = SpectrumAnalyzer::new(config.spectrum.clone())?;
        let block_frames = config.playback.block_frames;
        let output_len = block_frames * sink.channels().max(1);

        Ok(Self {
            transport: Transport::new(resolver),
            equalizer,
            analyzer,
            volume: Volume::new(config.playback.volume),
            sink,
            block_frames,
            block: vec![0.0; block_frames * MAX_CHANNELS],
            output: vec![0.0; output_len],
            pending: 0..0,
            position_interval: config.playback.position_update_ms as f64 / 1000.0,
            last_position_report: 0.0,
            events: VecDeque::new(),
        })
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn equalizer(&self) -> &Equalizer {
        &self.equalizer
    }

    pub fn volume(&self) -> &Volume {
        &self.volume
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Take events raised since the last call
    pub fn drain_events(&mut self) -> Vec<PlaybackEvent> {
        self.events.drain(..).collect()
    }

    /// Apply one command; only ever called between blocks
    pub fn apply_command(&mut self, command: EngineCommand) -> Result<()> {
        match command {
            EngineCommand::Load(track) => self.load(track),
            EngineCommand::Play => {
                if self.transport.play() {
                    self.emit_state();
                }
                Ok(())
            }
            EngineCommand::Pause => {
                if self.transport.pause() {
                    self.emit_state();
                }
                Ok(())
            }
            EngineCommand::Stop => {
                self.discard_output();
                self.analyzer.reset(0.0);
                match self.transport.stop() {
                    Ok(true) => {
                        self.emit_state();
                        Ok(())
                    }
                    Ok(false) => Ok(()),
                    Err(e) => Err(self.report_failure(e)),
                }
            }
            EngineCommand::Seek(seconds) => self.seek(seconds),
            EngineCommand::SetBandGain { band, gain_db } => {
                self.equalizer.set_band_gain(band, gain_db)?;
                self.emit_equalizer();
                Ok(())
            }
            EngineCommand::SetBassBoost(gain_db) => {
                self.equalizer.set_bass_boost(gain_db)?;
                self.emit_equalizer();
                Ok(())
            }
            EngineCommand::SetPreset(preset) => {
                self.equalizer.set_preset(preset);
                self.emit_equalizer();
                Ok(())
            }
            EngineCommand::SetEqualizerEnabled(enabled) => {
                self.equalizer.set_enabled(enabled);
                self.emit_equalizer();
                Ok(())
            }
            EngineCommand::ApplyEqualizer(settings) => {
                self.equalizer.apply_settings(&settings)?;
                self.emit_equalizer();
                Ok(())
            }
            EngineCommand::ResetEqualizer => {
                self.equalizer.reset_to_flat();
                self.emit_equalizer();
                Ok(())
            }
            EngineCommand::SetVolume(level) => {
                self.volume.set_level(level);
                self.emit_volume();
                Ok(())
            }
            EngineCommand::SetMuted(muted) => {
                self.volume.set_muted(muted);
                self.emit_volume();
                Ok(())
            }
            // Only meaningful to the audio thread loop
            EngineCommand::Shutdown => Ok(()),
        }
    }

    /// Push one block through the signal path
    ///
    /// Audio the sink rejected last time is offered again before anything new
    /// is decoded, so backpressure never drops samples.
    pub fn render_block(&mut self) -> Result<BlockOutcome> {
        if !self.pending.is_empty() && !self.flush_pending()? {
            return Ok(BlockOutcome::Backpressure);
        }

        let Some((sample_rate, channels)) = self.transport.format() else {
            return Ok(BlockOutcome::Idle);
        };
        let len = (self.block_frames * channels).min(self.block.len());

        match self.transport.render(&mut self.block[..len]) {
            RenderOutcome::Rendered(n) => {
                let block = &mut self.block[..n];
                self.equalizer.process(block, sample_rate, channels);
                if let Some(frame) = self.analyzer.push_samples(block) {
                    self.events
                        .push_back(PlaybackEvent::now(EventKind::Spectrum(frame)));
                }

                let out_channels = self.sink.channels().max(1);
                let out_len = remix(block, channels, &mut self.output, out_channels);
                self.volume
                    .process(&mut self.output[..out_len], self.sink.sample_rate(), out_channels);
                self.pending = 0..out_len;
                self.flush_pending()?;

                let position = self.transport.position();
                if position - self.last_position_report >= self.position_interval {
                    self.last_position_report = position;
                    self.emit_position();
                }
                Ok(BlockOutcome::Rendered)
            }
            RenderOutcome::EndOfTrack => {
                self.emit_position();
                if let Some(track) = self.transport.active_track() {
                    let track_id = track.id.clone();
                    tracing::info!(track_id = %track_id, "Track ended");
                    self.emit(EventKind::TrackEnded { track_id });
                }
                Ok(BlockOutcome::Idle)
            }
            RenderOutcome::Failed { track_id, reason } => {
                self.discard_output();
                self.emit(EventKind::Failure(PlaybackFailure::SourceUnavailable {
                    track_id,
                    reason,
                }));
                self.emit_state();
                Ok(BlockOutcome::Idle)
            }
            RenderOutcome::Idle => Ok(BlockOutcome::Idle),
        }
    }

    fn load(&mut self, track: Track) -> Result<()> {
        self.discard_output();
        let track_id = track.id.clone();

        if let Err(e) = self.transport.load_track(track) {
            return Err(self.report_failure(e));
        }

        if let Some((sample_rate, channels)) = self.transport.format() {
            if sample_rate != self.sink.sample_rate() {
                tracing::warn!(
                    track_id = %track_id,
                    stream_rate = sample_rate,
                    sink_rate = self.sink.sample_rate(),
                    "Stream and output sample rates differ"
                );
            }
            self.analyzer.set_format(sample_rate, channels)?;
        }
        self.analyzer.reset(0.0);
        self.equalizer.reset();
        self.last_position_report = 0.0;

        self.emit(EventKind::TrackLoaded {
            track_id,
            duration_secs: self.transport.duration(),
        });
        self.emit_state();
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        if !matches!(
            self.transport.state(),
            PlaybackState::Playing | PlaybackState::Paused
        ) {
            tracing::debug!(seconds, state = %self.transport.state(), "Seek ignored");
            return Ok(());
        }

        let applied = match self.transport.seek(seconds) {
            Ok(applied) => applied,
            Err(e @ PlaybackError::PreconditionViolation(_)) => return Err(e),
            Err(e) => return Err(self.report_failure(e)),
        };

        // Stale audio from before the seek must not reach the speaker
        self.discard_output();
        self.equalizer.reset();
        self.analyzer.reset(applied);
        self.last_position_report = applied;
        self.emit_position();
        Ok(())
    }

    /// Offer held-back output to the sink; true once all of it is accepted
    fn flush_pending(&mut self) -> Result<bool> {
        while !self.pending.is_empty() {
            let accepted = self.sink.write(&self.output[self.pending.clone()])?;
            if accepted == 0 {
                return Ok(false);
            }
            self.pending.start += accepted;
        }
        Ok(true)
    }

    fn discard_output(&mut self) {
        self.pending = 0..0;
        self.sink.discard();
    }

    /// Turn a transport error into events, passing it back to the caller
    fn report_failure(&mut self, error: PlaybackError) -> PlaybackError {
        if let PlaybackError::SourceUnavailable { track_id, reason } = &error {
            self.emit(EventKind::Failure(PlaybackFailure::SourceUnavailable {
                track_id: track_id.clone(),
                reason: reason.clone(),
            }));
        }
        self.emit_state();
        error
    }

    fn emit(&mut self, kind: EventKind) {
        self.events.push_back(PlaybackEvent::now(kind));
    }

    fn emit_state(&mut self) {
        self.emit(EventKind::StateChanged {
            state: self.transport.state(),
        });
    }

    fn emit_position(&mut self) {
        self.emit(EventKind::PositionUpdate {
            position_secs: self.transport.position(),
            duration_secs: self.transport.duration(),
        });
    }

    fn emit_equalizer(&mut self) {
        self.emit(EventKind::EqualizerChanged(self.equalizer.settings()));
    }

    fn emit_volume(&mut self) {
        self.emit(EventKind::VolumeChanged {
            level: self.volume.level(),
            muted: self.volume.is_muted(),
        });
    }
}

impl<S: OutputSink + 'static> AudioEngine<S> {
    /// Move the engine onto its own audio thread
    pub fn spawn(self, command_capacity: usize, event_capacity: usize) -> Result<EngineHandle> {
        let (command_tx, command_rx) = bounded(command_capacity);
        let (event_tx, event_rx) = bounded(event_capacity);

        let thread = thread::Builder::new()
            .name("resonance-engine".into())
            .spawn(move || self.run(&command_rx, &event_tx))
            .map_err(AudioError::from)?;

        Ok(EngineHandle {
            commands: command_tx,
            events: event_rx,
            thread: Some(thread),
        })
    }

    fn run(mut self, commands: &Receiver<EngineCommand>, events: &Sender<PlaybackEvent>) {
        tracing::info!("Audio engine started");
        let mut forwarder = EventForwarder::default();

        'audio: loop {
            // Commands only at block boundaries
            loop {
                match commands.try_recv() {
                    Ok(EngineCommand::Shutdown) | Err(TryRecvError::Disconnected) => break 'audio,
                    Ok(command) => self.apply_logged(command),
                    Err(TryRecvError::Empty) => break,
                }
            }

            let outcome = match self.render_block() {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(error = %e, "Output failed; stopping playback");
                    self.discard_output();
                    if let Err(e) = self.transport.stop() {
                        self.report_failure(e);
                    } else {
                        self.emit_state();
                    }
                    BlockOutcome::Idle
                }
            };

            if !forwarder.forward(&mut self.events, events) {
                break;
            }

            let wait = match outcome {
                BlockOutcome::Rendered => continue,
                BlockOutcome::Backpressure => BACKPRESSURE_WAIT,
                BlockOutcome::Idle => IDLE_WAIT,
            };
            match commands.recv_timeout(wait) {
                Ok(EngineCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
                Ok(command) => self.apply_logged(command),
                Err(RecvTimeoutError::Timeout) => {}
            }
        }

        self.discard_output();
        tracing::info!("Audio engine stopped");
    }

    fn apply_logged(&mut self, command: EngineCommand) {
        if let Err(e) = self.apply_command(command) {
            tracing::debug!(error = %e, "Engine command failed");
        }
    }
}

/// Moves events onto the bounded channel without blocking
#[derive(Debug, Default)]
struct EventForwarder {
    dropped: usize,
}

impl EventForwarder {
    /// Returns false once the receiver is gone
    fn forward(&mut self, backlog: &mut VecDeque<PlaybackEvent>, sender: &Sender<PlaybackEvent>) -> bool {
        while let Some(event) = backlog.pop_front() {
            match sender.try_send(event) {
                Ok(()) => {
                    if self.dropped > 0 {
                        tracing::debug!(dropped = self.dropped, "Event queue recovered");
                        self.dropped = 0;
                    }
                }
                Err(TrySendError::Full(event)) => {
                    if event.is_droppable() {
                        self.note_drop();
                        continue;
                    }
                    // Critical events wait at the front for the next block;
                    // periodic ones behind them are stale by then
                    backlog.push_front(event);
                    let before = backlog.len();
                    backlog.retain(|e| !e.is_droppable());
                    for _ in backlog.len()..before {
                        self.note_drop();
                    }
                    break;
                }
                Err(TrySendError::Disconnected(_)) => return false,
            }
        }
        true
    }

    fn note_drop(&mut self) {
        if self.dropped == 0 {
            tracing::warn!("Event queue full; dropping position and spectrum events");
        }
        self.dropped += 1;
    }
}

/// Write `input` frames into `output` with `out_channels` per frame
///
/// Channels are mapped round-robin, so mono fills every output channel.
/// Returns the number of samples written.
fn remix(input: &[f32], in_channels: usize, output: &mut [f32], out_channels: usize) -> usize {
    if in_channels == out_channels {
        let len = input.len().min(output.len());
        output[..len].copy_from_slice(&input[..len]);
        return len;
    }

    let mut written = 0;
    for (src, dst) in input
        .chunks_exact(in_channels)
        .zip(output.chunks_exact_mut(out_channels))
    {
        for (c, sample) in dst.iter_mut().enumerate() {
            *sample = src[c % in_channels];
        }
        written += out_channels;
    }
    written
}

impl<S: OutputSink> TransportControl for AudioEngine<S> {
    fn load_track(&mut self, track: Track) -> Result<()> {
        self.apply_command(EngineCommand::Load(track))
    }

    fn play(&mut self) -> Result<()> {
        self.apply_command(EngineCommand::Play)
    }

    fn pause(&mut self) -> Result<()> {
        self.apply_command(EngineCommand::Pause)
    }

    fn stop(&mut self) -> Result<()> {
        self.apply_command(EngineCommand::Stop)
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        self.apply_command(EngineCommand::Seek(seconds))
    }
}

/// Control-side handle to a spawned engine
pub struct EngineHandle {
    commands: Sender<EngineCommand>,
    events: Receiver<PlaybackEvent>,
    thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Queue a command for the next block boundary
    pub fn send(&self, command: EngineCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::EngineDisconnected)
    }

    pub fn try_recv_event(&self) -> Option<PlaybackEvent> {
        self.events.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_event_timeout(&self, timeout: Duration) -> Result<Option<PlaybackEvent>> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Ok(Some(event)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(PlaybackError::EngineDisconnected),
        }
    }

    /// Event receiver, for `select!`-style consumers
    pub fn events(&self) -> &Receiver<PlaybackEvent> {
        &self.events
    }

    /// Stop the audio thread and wait for it
    pub fn shutdown(mut self) -> Result<()> {
        self.stop_thread()
    }

    fn stop_thread(&mut self) -> Result<()> {
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        // The thread may already be gone; joining tells us how it ended
        let _ = self.commands.send(EngineCommand::Shutdown);
        thread.join().map_err(|_| PlaybackError::EngineDisconnected)
    }
}

impl TransportControl for EngineHandle {
    fn load_track(&mut self, track: Track) -> Result<()> {
        self.send(EngineCommand::Load(track))
    }

    fn play(&mut self) -> Result<()> {
        self.send(EngineCommand::Play)
    }

    fn pause(&mut self) -> Result<()> {
        self.send(EngineCommand::Pause)
    }

    fn stop(&mut self) -> Result<()> {
        self.send(EngineCommand::Stop)
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        self.send(EngineCommand::Seek(seconds))
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        if let Err(e) = self.stop_thread() {
            tracing::warn!(error = %e, "Audio thread did not shut down cleanly");
        }
    }
}
