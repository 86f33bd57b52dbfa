//! Master volume with logarithmic scaling
//!
//! Volume range is 0-100%, mapped to -60 dB to 0 dB internally. 0% is true
//! silence.

use resonance_audio::effects::AudioEffect;

/// Lowest audible level in dB (1%)
const MIN_DB: f32 = -60.0;

/// Volume controller with logarithmic scaling
#[derive(Debug, Clone)]
pub struct Volume {
    /// Volume level (0-100)
    level: u8,

    /// Mute state (preserves volume level)
    muted: bool,

    /// Cached linear gain multiplier
    linear_gain: f32,
}

impl Volume {
    /// Create a volume controller; levels above 100 are clamped
    pub fn new(level: u8) -> Self {
        let level = level.min(100);
        Self {
            level,
            muted: false,
            linear_gain: Self::calculate_linear_gain(level),
        }
    }

    pub fn set_level(&mut self, level: u8) {
        self.level = level.min(100);
        self.linear_gain = Self::calculate_linear_gain(self.level);
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    pub fn toggle_mute(&mut self) {
        self.muted = !self.muted;
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Linear gain multiplier; 0.0 when muted
    pub fn gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.linear_gain
        }
    }

    /// Current gain in dB, floored at -60
    pub fn to_db(&self) -> f32 {
        if self.level == 0 || self.muted {
            MIN_DB
        } else {
            20.0 * self.linear_gain.log10()
        }
    }

    /// gain = 10^(((level - 100) * 0.6) / 20)
    fn calculate_linear_gain(level: u8) -> f32 {
        if level == 0 {
            return 0.0;
        }
        let db = (f32::from(level) - 100.0) * (-MIN_DB / 100.0);
        10.0_f32.powf(db / 20.0)
    }
}

impl Default for Volume {
    fn default() -> Self {
        Self::new(80)
    }
}

impl AudioEffect for Volume {
    fn process(&mut self, buffer: &mut [f32], _sample_rate: u32, _channels: usize) {
        let gain = self.gain();
        if gain == 0.0 {
            buffer.fill(0.0);
        } else if gain != 1.0 {
            for sample in buffer.iter_mut() {
                *sample *= gain;
            }
        }
    }

    fn reset(&mut self) {}

    // Volume is always applied; muting is the way to silence it
    fn set_enabled(&mut self, _enabled: bool) {}

    fn is_enabled(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "Volume"
    }
}
