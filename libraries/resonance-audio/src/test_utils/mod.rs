//! Synthetic sources for tests
//!
//! Available to other crates through the `test-utils` feature.

use crate::error::{AudioError, Result};
use crate::source::{SampleStream, SourceResolver};
use resonance_core::SourceRef;
use std::collections::HashMap;
use std::f32::consts::TAU;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sine tone of fixed length
#[derive(Debug, Clone)]
pub struct ToneStream {
    frequency: f32,
    amplitude: f32,
    sample_rate: u32,
    channels: usize,
    total_frames: u64,
    position: u64,
    fail_at: Option<u64>,
}

impl ToneStream {
    pub fn new(frequency: f32, duration: Duration, sample_rate: u32, channels: usize) -> Self {
        Self {
            frequency,
            amplitude: 0.5,
            sample_rate,
            channels,
            total_frames: (duration.as_secs_f64() * sample_rate as f64).round() as u64,
            position: 0,
            fail_at: None,
        }
    }

    /// 440 Hz stereo tone at 44.1 kHz
    pub fn with_duration(duration: Duration) -> Self {
        Self::new(440.0, duration, 44_100, 2)
    }

    pub fn amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Report a decode error once playback reaches `position`
    pub fn failing_at(mut self, position: Duration) -> Self {
        self.fail_at = Some((position.as_secs_f64() * self.sample_rate as f64) as u64);
        self
    }

    /// Current read position in frames
    pub fn position_frames(&self) -> u64 {
        self.position
    }
}

impl SampleStream for ToneStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn read(&mut self, buffer: &mut [f32]) -> Result<usize> {
        if self.fail_at.is_some_and(|at| self.position >= at) {
            return Err(AudioError::Decode("synthetic decode failure".into()));
        }

        let mut end = self.total_frames;
        if let Some(at) = self.fail_at {
            end = end.min(at);
        }
        let remaining = end.saturating_sub(self.position) as usize;
        let frames = (buffer.len() / self.channels).min(remaining);

        let step = TAU * self.frequency / self.sample_rate as f32;
        for (i, frame) in buffer[..frames * self.channels]
            .chunks_exact_mut(self.channels)
            .enumerate()
        {
            let n = self.position + i as u64;
            let value = self.amplitude * (step * (n % self.sample_rate as u64) as f32).sin();
            frame.fill(value);
        }

        self.position += frames as u64;
        Ok(frames * self.channels)
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let frame = (position.as_secs_f64() * self.sample_rate as f64) as u64;
        self.position = frame.min(self.total_frames);
        Ok(())
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f64(
            self.total_frames as f64 / self.sample_rate as f64,
        ))
    }
}

type StreamFactory = Arc<dyn Fn() -> Box<dyn SampleStream> + Send + Sync>;

/// Resolver backed by an in-memory table of stream factories
///
/// Unknown references resolve to `SourceUnavailable`.
#[derive(Clone, Default)]
pub struct MemoryResolver {
    sources: HashMap<SourceRef, StreamFactory>,
    opens: Arc<AtomicUsize>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `source`
    pub fn insert<F>(&mut self, source: impl Into<SourceRef>, factory: F)
    where
        F: Fn() -> Box<dyn SampleStream> + Send + Sync + 'static,
    {
        self.sources.insert(source.into(), Arc::new(factory));
    }

    /// Register a copy of `tone` for `source`
    pub fn insert_tone(&mut self, source: impl Into<SourceRef>, tone: ToneStream) {
        self.insert(source, move || Box::new(tone.clone()) as Box<dyn SampleStream>);
    }

    /// Register a 440 Hz tone of `duration`
    pub fn with_tone(mut self, source: impl Into<SourceRef>, duration: Duration) -> Self {
        self.insert_tone(source, ToneStream::with_duration(duration));
        self
    }

    /// Successful opens so far (shared between clones)
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl SourceResolver for MemoryResolver {
    fn open(&self, source: &SourceRef) -> Result<Box<dyn SampleStream>> {
        let factory = self
            .sources
            .get(source)
            .ok_or_else(|| AudioError::unavailable(source.as_str(), "no such source"))?;
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(factory())
    }
}
