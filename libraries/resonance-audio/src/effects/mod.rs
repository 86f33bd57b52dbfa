//! Real-time audio effects
//!
//! Effects operate in place on interleaved f32 blocks. Parameter changes only
//! retarget filter coefficients; filter topology and buffers are fixed at
//! construction so they can be applied between any two blocks.

mod biquad;
mod equalizer;

pub use equalizer::{
    EqPreset, EqSettings, Equalizer, BAND_COUNT, BAND_FREQUENCIES, BASS_BOOST_FREQUENCY,
    MAX_BAND_GAIN_DB, MAX_BASS_BOOST_DB, MIN_BAND_GAIN_DB,
};

/// Trait for in-place audio effects
///
/// # Real-Time Constraints
/// - No allocations in `process()`
/// - No blocking operations
/// - Must be Send so the effect can move to the audio thread
pub trait AudioEffect: Send {
    /// Process an interleaved block in place
    fn process(&mut self, buffer: &mut [f32], sample_rate: u32, channels: usize);

    /// Clear internal history (seek, track change)
    fn reset(&mut self);

    fn set_enabled(&mut self, enabled: bool);

    fn is_enabled(&self) -> bool;

    /// Effect name for logging
    fn name(&self) -> &str;
}
