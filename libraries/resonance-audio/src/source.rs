//! Decodable sources
//!
//! The transport never knows where samples come from. A `SourceResolver` turns
//! a track's opaque `SourceRef` into a `SampleStream`, or reports the source as
//! unavailable.

use crate::error::Result;
use resonance_core::SourceRef;
use std::time::Duration;

/// Stream of interleaved f32 samples at a fixed rate and channel count
///
/// Implementors own the decode context; dropping the stream tears it down.
pub trait SampleStream: Send {
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> usize;

    /// Fill `buffer` with interleaved samples in [-1.0, 1.0]
    ///
    /// Returns the number of samples written, always a whole number of frames.
    /// `Ok(0)` means the stream is exhausted.
    fn read(&mut self, buffer: &mut [f32]) -> Result<usize>;

    /// Reposition the stream; buffered samples from before the seek are dropped
    fn seek(&mut self, position: Duration) -> Result<()>;

    /// Total duration, when the container reports one
    fn duration(&self) -> Option<Duration>;
}

/// Opens sample streams for source references
pub trait SourceResolver: Send + Sync {
    /// Open `source` for decoding
    ///
    /// Fails with `AudioError::SourceUnavailable` when the source cannot be
    /// opened or probed.
    fn open(&self, source: &SourceRef) -> Result<Box<dyn SampleStream>>;
}
