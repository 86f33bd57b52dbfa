//! Second-order IIR section with coefficient smoothing
//!
//! RBJ cookbook peaking and low-shelf designs. Coefficients move toward their
//! target a fixed fraction per frame, so retargeting mid-stream does not
//! produce a step in the output.

use std::f32::consts::PI;

/// Maximum interleaved channel count with independent filter state
pub const MAX_CHANNELS: usize = 8;

/// Per-frame interpolation factor toward target coefficients.
/// At 44.1 kHz this gives roughly a 10 ms time constant.
const SMOOTH_COEFF: f32 = 0.002;

/// Outputs below this are flushed to zero to avoid denormal slowdowns
const DENORMAL_THRESHOLD: f32 = 1e-15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    /// Pass-through
    pub(crate) const IDENTITY: Self = Self {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    /// Peaking EQ centered on `frequency`
    pub(crate) fn peaking(sample_rate: f32, frequency: f32, q: f32, gain_db: f32) -> Self {
        if sample_rate < 1.0 || gain_db == 0.0 {
            return Self::IDENTITY;
        }

        let a = 10.0_f32.powf(gain_db / 40.0);
        let omega = omega(sample_rate, frequency);
        let alpha = omega.sin() / (2.0 * q);
        let cos_omega = omega.cos();

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_omega) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_omega) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }

    /// Low shelf with corner at `frequency`
    pub(crate) fn low_shelf(sample_rate: f32, frequency: f32, q: f32, gain_db: f32) -> Self {
        if sample_rate < 1.0 || gain_db == 0.0 {
            return Self::IDENTITY;
        }

        let a = 10.0_f32.powf(gain_db / 40.0);
        let omega = omega(sample_rate, frequency);
        let cos_omega = omega.cos();
        let alpha = omega.sin() / 2.0 * ((a + 1.0 / a) * (1.0 / q - 1.0) + 2.0).sqrt();
        let beta = 2.0 * a.sqrt() * alpha;

        let a0 = (a + 1.0) + (a - 1.0) * cos_omega + beta;
        Self {
            b0: a * ((a + 1.0) - (a - 1.0) * cos_omega + beta) / a0,
            b1: 2.0 * a * ((a - 1.0) - (a + 1.0) * cos_omega) / a0,
            b2: a * ((a + 1.0) - (a - 1.0) * cos_omega - beta) / a0,
            a1: -2.0 * ((a - 1.0) + (a + 1.0) * cos_omega) / a0,
            a2: ((a + 1.0) + (a - 1.0) * cos_omega - beta) / a0,
        }
    }

    #[inline]
    fn step_toward(&mut self, target: &Self) {
        self.b0 += SMOOTH_COEFF * (target.b0 - self.b0);
        self.b1 += SMOOTH_COEFF * (target.b1 - self.b1);
        self.b2 += SMOOTH_COEFF * (target.b2 - self.b2);
        self.a1 += SMOOTH_COEFF * (target.a1 - self.a1);
        self.a2 += SMOOTH_COEFF * (target.a2 - self.a2);
    }
}

/// Normalized angular frequency, kept below Nyquist for stability
fn omega(sample_rate: f32, frequency: f32) -> f32 {
    let clamped = frequency.min(sample_rate * 0.45);
    2.0 * PI * clamped / sample_rate
}

#[derive(Debug, Clone, Copy, Default)]
struct ChannelState {
    x1: f32,
    x2: f32,
    y1: f32,
    y2: f32,
}

/// Direct form I biquad with per-channel history
#[derive(Debug, Clone)]
pub(crate) struct Biquad {
    target: Coefficients,
    active: Coefficients,
    state: [ChannelState; MAX_CHANNELS],
}

impl Biquad {
    pub(crate) fn new() -> Self {
        Self {
            target: Coefficients::IDENTITY,
            active: Coefficients::IDENTITY,
            state: [ChannelState::default(); MAX_CHANNELS],
        }
    }

    /// Retarget; active coefficients follow over the next frames
    pub(crate) fn set_target(&mut self, coefficients: Coefficients) {
        self.target = coefficients;
    }

    /// Clear history and jump straight to the target coefficients
    pub(crate) fn reset(&mut self) {
        self.state = [ChannelState::default(); MAX_CHANNELS];
        self.active = self.target;
    }

    /// Filter an interleaved block in place
    ///
    /// Channels beyond `MAX_CHANNELS` are left untouched.
    pub(crate) fn process(&mut self, buffer: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        let filtered = channels.min(MAX_CHANNELS);

        for frame in buffer.chunks_exact_mut(channels) {
            if self.active != self.target {
                self.active.step_toward(&self.target);
            }
            for (sample, state) in frame[..filtered].iter_mut().zip(self.state.iter_mut()) {
                *sample = tick(&self.active, state, *sample);
            }
        }
    }
}

#[inline]
fn tick(c: &Coefficients, s: &mut ChannelState, input: f32) -> f32 {
    let mut out = c.b0 * input + c.b1 * s.x1 + c.b2 * s.x2 - c.a1 * s.y1 - c.a2 * s.y2;
    if out.abs() < DENORMAL_THRESHOLD {
        out = 0.0;
    }
    s.x2 = s.x1;
    s.x1 = input;
    s.y2 = s.y1;
    s.y1 = out;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(frequency: f32, sample_rate: f32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate).sin() * 0.5)
            .collect()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn identity_passes_through() {
        let mut filter = Biquad::new();
        let mut buffer = vec![0.25, -0.5, 0.75, -1.0];
        let original = buffer.clone();
        filter.process(&mut buffer, 2);
        assert_eq!(buffer, original);
    }

    #[test]
    fn zero_gain_is_identity_coefficients() {
        assert_eq!(
            Coefficients::peaking(44_100.0, 1_000.0, 1.41, 0.0),
            Coefficients::IDENTITY
        );
        assert_eq!(
            Coefficients::low_shelf(44_100.0, 150.0, 0.707, 0.0),
            Coefficients::IDENTITY
        );
    }

    #[test]
    fn peaking_boosts_center_frequency() {
        let mut filter = Biquad::new();
        filter.set_target(Coefficients::peaking(44_100.0, 1_000.0, 1.41, 12.0));
        filter.reset();

        let input = sine(1_000.0, 44_100.0, 8_192);
        let mut output = input.clone();
        filter.process(&mut output, 1);

        // Skip the transient
        let gain = rms(&output[4_096..]) / rms(&input[4_096..]);
        assert!(gain > 3.5 && gain < 4.5, "expected ~+12 dB, got {gain}");
    }

    #[test]
    fn peaking_leaves_distant_frequency_alone() {
        let mut filter = Biquad::new();
        filter.set_target(Coefficients::peaking(44_100.0, 8_000.0, 1.41, 12.0));
        filter.reset();

        let input = sine(100.0, 44_100.0, 8_192);
        let mut output = input.clone();
        filter.process(&mut output, 1);

        let gain = rms(&output[4_096..]) / rms(&input[4_096..]);
        assert!((gain - 1.0).abs() < 0.05, "expected ~unity, got {gain}");
    }

    #[test]
    fn low_shelf_boosts_bass() {
        let mut filter = Biquad::new();
        filter.set_target(Coefficients::low_shelf(44_100.0, 150.0, 0.707, 12.0));
        filter.reset();

        let input = sine(40.0, 44_100.0, 16_384);
        let mut output = input.clone();
        filter.process(&mut output, 1);

        let gain = rms(&output[8_192..]) / rms(&input[8_192..]);
        assert!(gain > 3.0, "expected a strong bass boost, got {gain}");
    }

    #[test]
    fn retarget_is_smoothed() {
        let mut filter = Biquad::new();
        filter.set_target(Coefficients::peaking(44_100.0, 1_000.0, 1.41, 12.0));

        let mut buffer = vec![0.5; 2];
        filter.process(&mut buffer, 1);

        // One frame in, coefficients have barely moved away from identity
        assert!((buffer[0] - 0.5).abs() < 0.05);
    }

    #[test]
    fn channels_have_independent_state() {
        let mut filter = Biquad::new();
        filter.set_target(Coefficients::peaking(44_100.0, 1_000.0, 1.41, 6.0));
        filter.reset();

        // Left carries signal, right is silent
        let mut buffer: Vec<f32> = (0..512)
            .flat_map(|i| [((i as f32) * 0.1).sin(), 0.0])
            .collect();
        filter.process(&mut buffer, 2);

        assert!(buffer.iter().skip(1).step_by(2).all(|&s| s == 0.0));
    }
}
