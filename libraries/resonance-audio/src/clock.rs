//! Sample clock
//!
//! Playback position derived from the number of frames actually consumed, not
//! from wall time. The transport uses it for end-of-track detection and the
//! spectrum analyzer for frame timestamps.

/// Position counter driven by consumed audio frames
///
/// The position is `origin + frames / sample_rate`, with the frame count kept
/// as an integer so long tracks do not accumulate rounding drift. A sample-rate
/// change folds the elapsed time into the origin before counting restarts.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleClock {
    origin: f64,
    frames: u64,
    sample_rate: u32,
}

impl SampleClock {
    /// Create a clock at position zero
    pub fn new() -> Self {
        Self {
            origin: 0.0,
            frames: 0,
            sample_rate: 0,
        }
    }

    /// Account for `frames` consumed at `sample_rate` and return the new position
    ///
    /// # Panics
    /// Panics if `sample_rate` is zero.
    pub fn advance(&mut self, frames: u64, sample_rate: u32) -> f64 {
        assert!(sample_rate > 0, "sample clock advanced with a zero sample rate");

        if sample_rate != self.sample_rate {
            self.origin = self.position();
            self.frames = 0;
            self.sample_rate = sample_rate;
        }
        self.frames = self.frames.saturating_add(frames);
        self.position()
    }

    /// Jump to `seconds` (seek, track change)
    ///
    /// # Panics
    /// Panics if `seconds` is negative or not finite.
    pub fn reset(&mut self, seconds: f64) {
        assert!(
            seconds.is_finite() && seconds >= 0.0,
            "sample clock reset to invalid position {seconds}"
        );
        self.origin = seconds;
        self.frames = 0;
    }

    /// Current position in seconds
    pub fn position(&self) -> f64 {
        if self.sample_rate == 0 {
            self.origin
        } else {
            self.origin + self.frames as f64 / f64::from(self.sample_rate)
        }
    }

    /// Seconds elapsed since `mark`, zero if `mark` is ahead of the clock
    pub fn elapsed_since(&self, mark: f64) -> f64 {
        (self.position() - mark).max(0.0)
    }
}

impl Default for SampleClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn starts_at_zero() {
        let clock = SampleClock::new();
        assert_eq!(clock.position(), 0.0);
    }

    #[test]
    fn advance_counts_frames() {
        let mut clock = SampleClock::new();
        assert_eq!(clock.advance(44_100, 44_100), 1.0);
        assert_eq!(clock.advance(22_050, 44_100), 1.5);
    }

    #[test]
    fn sample_rate_change_keeps_elapsed_time() {
        let mut clock = SampleClock::new();
        clock.advance(48_000, 48_000);
        let position = clock.advance(22_050, 44_100);
        assert!((position - 1.5).abs() < 1e-12);
    }

    #[test]
    fn reset_then_advance() {
        let mut clock = SampleClock::new();
        clock.advance(1_000, 1_000);
        clock.reset(10.0);
        assert_eq!(clock.position(), 10.0);
        assert_eq!(clock.advance(500, 1_000), 10.5);
    }

    #[test]
    fn elapsed_since_mark() {
        let mut clock = SampleClock::new();
        clock.advance(3_000, 1_000);
        assert_eq!(clock.elapsed_since(1.0), 2.0);
        assert_eq!(clock.elapsed_since(5.0), 0.0);
    }

    #[test]
    #[should_panic(expected = "invalid position")]
    fn negative_reset_panics() {
        SampleClock::new().reset(-1.0);
    }

    #[test]
    #[should_panic(expected = "zero sample rate")]
    fn zero_sample_rate_panics() {
        SampleClock::new().advance(10, 0);
    }

    proptest! {
        #[test]
        fn position_never_decreases(steps in proptest::collection::vec((0u64..10_000, prop::sample::select(vec![22_050u32, 44_100, 48_000, 96_000])), 1..50)) {
            let mut clock = SampleClock::new();
            let mut last = clock.position();
            for (frames, rate) in steps {
                let now = clock.advance(frames, rate);
                prop_assert!(now >= last - 1e-9);
                last = now;
            }
        }
    }
}
