//! Resonance Audio
//!
//! Signal-path building blocks for Resonance.
//!
//! This crate provides:
//! - A sample-accurate playback clock (`SampleClock`)
//! - A 10-band graphic equalizer with bass boost and presets
//! - An FFT spectrum analyzer producing log-spaced magnitude buckets
//! - Source and sink traits, with Symphonia file decoding and a CPAL output
//!   sink (`desktop` feature)
//!
//! # Example: Equalizer
//!
//! ```rust
//! use resonance_audio::effects::{AudioEffect, EqPreset, Equalizer};
//!
//! let mut eq = Equalizer::new();
//! eq.set_preset(EqPreset::Rock);
//! eq.set_band_gain(0, 6.0).unwrap();
//! assert_eq!(eq.preset_label(), "custom");
//!
//! let mut buffer = vec![0.0; 1024]; // Stereo samples
//! eq.process(&mut buffer, 44100, 2);
//! ```
//!
//! # Example: Spectrum
//!
//! ```rust
//! use resonance_audio::{SpectrumAnalyzer, SpectrumConfig};
//!
//! let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig::default()).unwrap();
//! let frame = analyzer.push_samples(&vec![0.0; 4096]).unwrap();
//! assert_eq!(frame.bucket_count(), 64);
//! ```

pub mod clock;
pub mod decoder;
pub mod effects;
mod error;
#[cfg(feature = "desktop")]
pub mod output;
pub mod sink;
pub mod source;
pub mod spectrum;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use clock::SampleClock;
pub use decoder::{FileResolver, SymphoniaStream};
pub use error::{AudioError, Result};
#[cfg(feature = "desktop")]
pub use output::CpalSink;
pub use sink::{MemorySink, NullSink, OutputSink};
pub use source::{SampleStream, SourceResolver};
pub use spectrum::{SpectrumAnalyzer, SpectrumConfig, SpectrumFrame};
