//! Output sinks
//!
//! A sink accepts filtered sample blocks for playback. Sinks signal
//! backpressure by accepting fewer samples than offered; the caller keeps the
//! remainder and offers it again later instead of dropping it.

use crate::error::Result;

/// Destination for rendered audio
pub trait OutputSink: Send {
    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Interleaved channel count
    fn channels(&self) -> usize;

    /// Offer interleaved samples
    ///
    /// Returns how many leading samples were accepted. Zero means the sink is
    /// full right now.
    fn write(&mut self, samples: &[f32]) -> Result<usize>;

    /// Drop audio that was accepted but not yet played (seek, track change)
    fn discard(&mut self) {}
}

/// Sink that accepts and drops everything
#[derive(Debug, Clone)]
pub struct NullSink {
    sample_rate: u32,
    channels: usize,
}

impl NullSink {
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }
}

impl OutputSink for NullSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn write(&mut self, samples: &[f32]) -> Result<usize> {
        Ok(samples.len())
    }
}

/// Sink that records everything it accepts
///
/// With a capacity it behaves like a device buffer that fills up: once
/// `capacity` samples are pending it rejects further writes until
/// [`MemorySink::consume`] frees space.
#[derive(Debug, Clone)]
pub struct MemorySink {
    sample_rate: u32,
    channels: usize,
    capacity: Option<usize>,
    pending: usize,
    recorded: Vec<f32>,
    discards: usize,
}

impl MemorySink {
    /// Unbounded sink
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels,
            capacity: None,
            pending: 0,
            recorded: Vec::new(),
            discards: 0,
        }
    }

    /// Sink that holds at most `capacity` unconsumed samples
    pub fn with_capacity(sample_rate: u32, channels: usize, capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::new(sample_rate, channels)
        }
    }

    /// Everything accepted so far
    pub fn recorded(&self) -> &[f32] {
        &self.recorded
    }

    /// Pretend the device played `samples` samples
    pub fn consume(&mut self, samples: usize) {
        self.pending = self.pending.saturating_sub(samples);
    }

    /// Number of `discard` calls
    pub fn discards(&self) -> usize {
        self.discards
    }
}

impl OutputSink for MemorySink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        self.channels
    }

    fn write(&mut self, samples: &[f32]) -> Result<usize> {
        let room = self
            .capacity
            .map_or(samples.len(), |cap| cap.saturating_sub(self.pending));
        // Whole frames only
        let accepted = room.min(samples.len()) / self.channels.max(1) * self.channels.max(1);
        self.recorded.extend_from_slice(&samples[..accepted]);
        self.pending += accepted;
        Ok(accepted)
    }

    fn discard(&mut self) {
        self.pending = 0;
        self.discards += 1;
    }
}
