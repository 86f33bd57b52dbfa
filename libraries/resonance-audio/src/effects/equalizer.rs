//! Ten-band graphic equalizer with bass boost
//!
//! - Octave bands from 32 Hz to 16 kHz, peaking filters in series
//! - Per-band gain clamped to -12..+12 dB
//! - Low-shelf bass boost at 150 Hz, 0..+12 dB, after the bands
//! - Named presets; manual band edits reclassify the settings as custom
//! - Disabled means bit-exact pass-through; stored gains are kept

use super::biquad::{Biquad, Coefficients};
use super::AudioEffect;
use crate::error::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of equalizer bands
pub const BAND_COUNT: usize = 10;

/// Band center frequencies (Hz), doubling each step
pub const BAND_FREQUENCIES: [f32; BAND_COUNT] = [
    32.0, 64.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

pub const MIN_BAND_GAIN_DB: f32 = -12.0;
pub const MAX_BAND_GAIN_DB: f32 = 12.0;
pub const MAX_BASS_BOOST_DB: f32 = 12.0;

/// Corner frequency of the bass-boost shelf (Hz)
pub const BASS_BOOST_FREQUENCY: f32 = 150.0;

/// Octave bandwidth
const BAND_Q: f32 = 1.41;

/// Butterworth slope for the shelf
const SHELF_Q: f32 = 0.707;

const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Named equalizer preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EqPreset {
    Flat,
    Rock,
    Pop,
    Jazz,
    Classical,
    Electronic,
    BassBoost,
    TrebleBoost,
    Vocal,
}

impl EqPreset {
    /// Every preset, in display order
    pub const ALL: [EqPreset; 9] = [
        Self::Flat,
        Self::Rock,
        Self::Pop,
        Self::Jazz,
        Self::Classical,
        Self::Electronic,
        Self::BassBoost,
        Self::TrebleBoost,
        Self::Vocal,
    ];

    /// Band gains in dB, lowest band first
    pub fn gains(self) -> [f32; BAND_COUNT] {
        match self {
            Self::Flat => [0.0; BAND_COUNT],
            Self::Rock => [5.0, 3.0, -1.0, -2.0, 1.0, 2.0, 4.0, 6.0, 7.0, 6.0],
            Self::Pop => [-1.0, 2.0, 4.0, 4.0, 1.0, -1.0, -2.0, -2.0, -1.0, -1.0],
            Self::Jazz => [3.0, 2.0, 1.0, 2.0, -1.0, -1.0, 0.0, 1.0, 2.0, 3.0],
            Self::Classical => [4.0, 3.0, 2.0, 1.0, -1.0, -2.0, -1.0, 2.0, 3.0, 4.0],
            Self::Electronic => [4.0, 3.0, 1.0, 0.0, -2.0, 2.0, 1.0, 2.0, 4.0, 5.0],
            Self::BassBoost => [7.0, 6.0, 5.0, 3.0, 1.0, 0.0, -1.0, -2.0, -2.0, -3.0],
            Self::TrebleBoost => [-3.0, -2.0, -1.0, 0.0, 1.0, 3.0, 5.0, 6.0, 7.0, 8.0],
            Self::Vocal => [-2.0, -1.0, 1.0, 3.0, 4.0, 4.0, 3.0, 1.0, 0.0, -1.0],
        }
    }

    /// Bass-boost stage this preset sets, if it defines one
    pub fn bass_boost_db(self) -> Option<f32> {
        match self {
            Self::BassBoost => Some(4.0),
            _ => None,
        }
    }

    /// Stable identifier used in config files and on the command line
    pub fn id(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Rock => "rock",
            Self::Pop => "pop",
            Self::Jazz => "jazz",
            Self::Classical => "classical",
            Self::Electronic => "electronic",
            Self::BassBoost => "bass-boost",
            Self::TrebleBoost => "treble-boost",
            Self::Vocal => "vocal",
        }
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::Flat => "Flat",
            Self::Rock => "Rock",
            Self::Pop => "Pop",
            Self::Jazz => "Jazz",
            Self::Classical => "Classical",
            Self::Electronic => "Electronic",
            Self::BassBoost => "Bass Boost",
            Self::TrebleBoost => "Treble Boost",
            Self::Vocal => "Vocal",
        }
    }
}

impl fmt::Display for EqPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for EqPreset {
    type Err = AudioError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "bass" => return Ok(Self::BassBoost),
            "treble" => return Ok(Self::TrebleBoost),
            _ => {}
        }
        Self::ALL
            .into_iter()
            .find(|p| p.id() == normalized)
            .ok_or_else(|| AudioError::precondition(format!("unknown equalizer preset '{s}'")))
    }
}

/// Serializable snapshot of equalizer state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EqSettings {
    pub gains: [f32; BAND_COUNT],
    pub bass_boost_db: f32,
    pub enabled: bool,
    /// `None` means custom
    pub preset: Option<EqPreset>,
}

impl EqSettings {
    /// Preset id, or `"custom"`
    pub fn preset_label(&self) -> &'static str {
        self.preset.map_or("custom", EqPreset::id)
    }
}

impl Default for EqSettings {
    fn default() -> Self {
        Self {
            gains: [0.0; BAND_COUNT],
            bass_boost_db: 0.0,
            enabled: true,
            preset: Some(EqPreset::Flat),
        }
    }
}

/// Ten-band graphic equalizer
pub struct Equalizer {
    gains: [f32; BAND_COUNT],
    bass_boost_db: f32,
    preset: Option<EqPreset>,
    enabled: bool,

    bands: [Biquad; BAND_COUNT],
    bass: Biquad,

    sample_rate: u32,
    /// Targets must be recomputed from the stored gains
    needs_update: bool,
    /// History must be cleared and coefficients snapped (start, re-enable, rate change)
    needs_reset: bool,
}

impl Equalizer {
    /// Create a flat, enabled equalizer
    pub fn new() -> Self {
        Self {
            gains: [0.0; BAND_COUNT],
            bass_boost_db: 0.0,
            preset: Some(EqPreset::Flat),
            enabled: true,
            bands: std::array::from_fn(|_| Biquad::new()),
            bass: Biquad::new(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            needs_update: true,
            needs_reset: true,
        }
    }

    /// Create an equalizer restored from a snapshot
    pub fn with_settings(settings: &EqSettings) -> Result<Self> {
        let mut eq = Self::new();
        eq.apply_settings(settings)?;
        Ok(eq)
    }

    pub fn band_count(&self) -> usize {
        BAND_COUNT
    }

    pub fn band_frequency(&self, index: usize) -> Option<f32> {
        BAND_FREQUENCIES.get(index).copied()
    }

    pub fn band_gain(&self, index: usize) -> Option<f32> {
        self.gains.get(index).copied()
    }

    pub fn gains(&self) -> [f32; BAND_COUNT] {
        self.gains
    }

    /// Set one band's gain in dB, clamped to -12..+12
    ///
    /// Reclassifies the settings as custom. An out-of-range index or a NaN
    /// gain is a caller bug and is rejected.
    pub fn set_band_gain(&mut self, index: usize, gain_db: f32) -> Result<()> {
        if index >= BAND_COUNT {
            return Err(AudioError::precondition(format!(
                "band index {index} out of range (0..{BAND_COUNT})"
            )));
        }
        if gain_db.is_nan() {
            return Err(AudioError::precondition("band gain is NaN"));
        }

        let clamped = gain_db.clamp(MIN_BAND_GAIN_DB, MAX_BAND_GAIN_DB);
        self.preset = None;
        if self.gains[index] != clamped {
            self.gains[index] = clamped;
            self.needs_update = true;
        }
        Ok(())
    }

    pub fn bass_boost(&self) -> f32 {
        self.bass_boost_db
    }

    /// Set the bass-boost shelf gain in dB, clamped to 0..+12
    pub fn set_bass_boost(&mut self, gain_db: f32) -> Result<()> {
        if gain_db.is_nan() {
            return Err(AudioError::precondition("bass boost gain is NaN"));
        }
        let clamped = gain_db.clamp(0.0, MAX_BASS_BOOST_DB);
        if self.bass_boost_db != clamped {
            self.bass_boost_db = clamped;
            self.needs_update = true;
        }
        Ok(())
    }

    /// Active preset, `None` when custom
    pub fn preset(&self) -> Option<EqPreset> {
        self.preset
    }

    /// Preset id, or `"custom"`
    pub fn preset_label(&self) -> &'static str {
        self.preset.map_or("custom", EqPreset::id)
    }

    /// Overwrite every band with the preset's gains
    ///
    /// Bass boost is cleared unless the preset defines its own.
    pub fn set_preset(&mut self, preset: EqPreset) {
        self.gains = preset.gains();
        self.bass_boost_db = preset.bass_boost_db().unwrap_or(0.0);
        self.preset = Some(preset);
        self.needs_update = true;
        tracing::debug!(preset = %preset, "Equalizer preset applied");
    }

    /// Flat bands, no bass boost
    pub fn reset_to_flat(&mut self) {
        self.set_preset(EqPreset::Flat);
    }

    pub fn settings(&self) -> EqSettings {
        EqSettings {
            gains: self.gains,
            bass_boost_db: self.bass_boost_db,
            enabled: self.enabled,
            preset: self.preset,
        }
    }

    /// Restore a snapshot, clamping gains the same way the setters do
    pub fn apply_settings(&mut self, settings: &EqSettings) -> Result<()> {
        if settings.gains.iter().any(|g| g.is_nan()) || settings.bass_boost_db.is_nan() {
            return Err(AudioError::precondition("equalizer settings contain NaN"));
        }
        self.gains = settings
            .gains
            .map(|g| g.clamp(MIN_BAND_GAIN_DB, MAX_BAND_GAIN_DB));
        self.bass_boost_db = settings.bass_boost_db.clamp(0.0, MAX_BASS_BOOST_DB);
        self.preset = settings.preset;
        self.needs_update = true;
        self.set_enabled(settings.enabled);
        Ok(())
    }

    fn update_coefficients(&mut self) {
        let sr = self.sample_rate as f32;
        for ((band, &freq), &gain) in self
            .bands
            .iter_mut()
            .zip(BAND_FREQUENCIES.iter())
            .zip(self.gains.iter())
        {
            band.set_target(Coefficients::peaking(sr, freq, BAND_Q, gain));
        }
        self.bass.set_target(Coefficients::low_shelf(
            sr,
            BASS_BOOST_FREQUENCY,
            SHELF_Q,
            self.bass_boost_db,
        ));
        self.needs_update = false;
    }
}

impl Default for Equalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioEffect for Equalizer {
    fn process(&mut self, buffer: &mut [f32], sample_rate: u32, channels: usize) {
        if !self.enabled {
            return;
        }

        if self.sample_rate != sample_rate {
            self.sample_rate = sample_rate;
            self.needs_update = true;
            self.needs_reset = true;
        }
        if self.needs_update {
            self.update_coefficients();
        }
        if self.needs_reset {
            self.reset();
        }

        for band in &mut self.bands {
            band.process(buffer, channels);
        }
        self.bass.process(buffer, channels);
    }

    fn reset(&mut self) {
        for band in &mut self.bands {
            band.reset();
        }
        self.bass.reset();
        self.needs_reset = false;
    }

    fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            // Stale history from before the bypass would click
            self.needs_reset = true;
        }
        self.enabled = enabled;
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn name(&self) -> &str {
        "10-Band Equalizer"
    }
}
