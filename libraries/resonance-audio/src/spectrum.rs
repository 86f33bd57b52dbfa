//! Spectrum analyzer
//!
//! Turns post-EQ samples into fixed-size magnitude frames for visualization:
//! mono downmix, Hann window, real FFT, log-spaced buckets, and running-peak
//! normalization into [0, 1]. Frames only exist when real audio is pushed; the
//! analyzer never synthesizes motion.

use crate::clock::SampleClock;
use crate::error::{AudioError, Result};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::sync::Arc;

/// Peak estimates below this are treated as silence
const SILENCE_FLOOR: f32 = 1e-6;

/// Analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Output buckets per frame
    pub buckets: usize,
    /// Transform size; a power of two, at least twice `buckets`
    pub window_size: usize,
    /// Per-frame decay of the running peak, in (0, 1]
    pub peak_decay: f32,
    /// Lower edge of the first bucket (Hz)
    pub min_frequency_hz: f32,
}

impl SpectrumConfig {
    pub fn validate(&self) -> Result<()> {
        if self.buckets == 0 {
            return Err(AudioError::precondition("spectrum needs at least one bucket"));
        }
        if !self.window_size.is_power_of_two() {
            return Err(AudioError::precondition(format!(
                "spectrum window {} is not a power of two",
                self.window_size
            )));
        }
        if self.window_size < self.buckets * 2 {
            return Err(AudioError::precondition(format!(
                "spectrum window {} too small for {} buckets",
                self.window_size, self.buckets
            )));
        }
        if !(self.peak_decay > 0.0 && self.peak_decay <= 1.0) {
            return Err(AudioError::precondition(format!(
                "peak decay {} outside (0, 1]",
                self.peak_decay
            )));
        }
        if !(self.min_frequency_hz.is_finite() && self.min_frequency_hz > 0.0) {
            return Err(AudioError::precondition(format!(
                "minimum frequency {} must be positive",
                self.min_frequency_hz
            )));
        }
        Ok(())
    }
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            buckets: 64,
            window_size: 2048,
            peak_decay: 0.995,
            min_frequency_hz: 20.0,
        }
    }
}

/// One emitted visualization frame
///
/// Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumFrame {
    magnitudes: Box<[f32]>,
    timestamp: f64,
}

impl SpectrumFrame {
    /// Normalized magnitude per bucket, lowest frequency first
    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }

    /// Clock position (seconds) of the first sample in the window
    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn bucket_count(&self) -> usize {
        self.magnitudes.len()
    }
}

/// Streaming FFT analyzer
pub struct SpectrumAnalyzer {
    config: SpectrumConfig,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    window_gain: f32,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,

    /// Mono samples of the window being filled
    pending: Vec<f32>,
    /// Bin range `[start, end)` per bucket
    bucket_bins: Vec<(usize, usize)>,
    levels: Vec<f32>,
    peak: f32,

    clock: SampleClock,
    window_start: f64,
    sample_rate: u32,
    channels: usize,
}

impl SpectrumAnalyzer {
    /// Create an analyzer for 44.1 kHz stereo input
    pub fn new(config: SpectrumConfig) -> Result<Self> {
        config.validate()?;

        let n = config.window_size;
        let fft = FftPlanner::new().plan_fft_forward(n);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let window: Vec<f32> = (0..n)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / n as f32).cos()))
            .collect();
        let window_gain = window.iter().sum::<f32>();

        let mut analyzer = Self {
            fft,
            window,
            window_gain,
            spectrum: vec![Complex::new(0.0, 0.0); n],
            scratch,
            pending: Vec::with_capacity(n),
            bucket_bins: Vec::with_capacity(config.buckets),
            levels: vec![0.0; config.buckets],
            peak: 0.0,
            clock: SampleClock::new(),
            window_start: 0.0,
            sample_rate: 44_100,
            channels: 2,
            config,
        };
        analyzer.rebuild_buckets();
        Ok(analyzer)
    }

    pub fn config(&self) -> &SpectrumConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Clock position of the next sample to be pushed
    pub fn position(&self) -> f64 {
        self.clock.position()
    }

    /// Change the input format; drops any partial window
    pub fn set_format(&mut self, sample_rate: u32, channels: usize) -> Result<()> {
        if sample_rate == 0 || channels == 0 {
            return Err(AudioError::precondition(format!(
                "invalid analyzer format: {sample_rate} Hz, {channels} channels"
            )));
        }
        if sample_rate != self.sample_rate || channels != self.channels {
            self.sample_rate = sample_rate;
            self.channels = channels;
            self.pending.clear();
            self.rebuild_buckets();
        }
        Ok(())
    }

    /// Restart at `seconds` (seek, track load)
    ///
    /// Partial windows and the running peak are discarded so the next frame
    /// only reflects audio from the new position.
    pub fn reset(&mut self, seconds: f64) {
        self.pending.clear();
        self.peak = 0.0;
        self.clock.reset(seconds);
    }

    /// Feed interleaved samples; returns the frame completed by this push
    ///
    /// A trailing partial frame (fewer samples than the channel count) is
    /// ignored. When one push completes several windows only the newest frame
    /// is returned.
    pub fn push_samples(&mut self, samples: &[f32]) -> Option<SpectrumFrame> {
        let channels = self.channels;
        let scale = 1.0 / channels as f32;
        let mut latest = None;

        for frame in samples.chunks_exact(channels) {
            if self.pending.is_empty() {
                self.window_start = self.clock.position();
            }
            self.pending.push(frame.iter().sum::<f32>() * scale);
            self.clock.advance(1, self.sample_rate);

            if self.pending.len() == self.config.window_size {
                latest = Some(self.analyze());
                self.pending.clear();
            }
        }
        latest
    }

    fn analyze(&mut self) -> SpectrumFrame {
        for ((bin, &sample), &w) in self
            .spectrum
            .iter_mut()
            .zip(self.pending.iter())
            .zip(self.window.iter())
        {
            *bin = Complex::new(sample * w, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        // Single-sided amplitude, corrected for the window's coherent gain
        let norm = 2.0 / self.window_gain;
        let mut frame_max = 0.0f32;
        for (level, &(start, end)) in self.levels.iter_mut().zip(self.bucket_bins.iter()) {
            let magnitude = self.spectrum[start..end]
                .iter()
                .map(|c| c.norm() * norm)
                .fold(0.0f32, f32::max);
            *level = magnitude;
            frame_max = frame_max.max(magnitude);
        }

        self.peak = frame_max.max(self.peak * self.config.peak_decay);
        let magnitudes: Box<[f32]> = if self.peak < SILENCE_FLOOR {
            vec![0.0; self.levels.len()].into_boxed_slice()
        } else {
            self.levels
                .iter()
                .map(|&m| (m / self.peak).clamp(0.0, 1.0))
                .collect()
        };

        SpectrumFrame {
            magnitudes,
            timestamp: self.window_start,
        }
    }

    /// Map log-spaced bucket edges onto FFT bins
    fn rebuild_buckets(&mut self) {
        let n = self.config.window_size;
        let buckets = self.config.buckets;
        let last_bin = n / 2;
        let bin_hz = self.sample_rate as f32 / n as f32;
        let nyquist = self.sample_rate as f32 / 2.0;
        let low = self.config.min_frequency_hz.min(nyquist / 2.0).max(bin_hz);
        let ratio = nyquist / low;

        self.bucket_bins.clear();
        for b in 0..buckets {
            let f_lo = low * ratio.powf(b as f32 / buckets as f32);
            let f_hi = low * ratio.powf((b + 1) as f32 / buckets as f32);

            let start = ((f_lo / bin_hz).floor() as usize).clamp(1, last_bin);
            let mut end = ((f_hi / bin_hz).ceil() as usize).min(last_bin + 1);
            if end <= start {
                end = start + 1;
            }
            self.bucket_bins.push((start, end));
        }
    }
}
