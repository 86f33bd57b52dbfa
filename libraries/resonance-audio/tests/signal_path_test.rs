//! Equalizer output as seen by the spectrum analyzer
//!
//! Runs synthetic tones through the same block path the engine uses:
//! source → equalizer → analyzer.

use resonance_audio::effects::{AudioEffect, EqPreset, Equalizer};
use resonance_audio::test_utils::ToneStream;
use resonance_audio::{SampleStream, SpectrumAnalyzer, SpectrumConfig, SpectrumFrame};
use std::time::Duration;

const SAMPLE_RATE: u32 = 44_100;
const BLOCK: usize = 512 * 2;

// ===== Test Helpers =====

/// Sum of a low and a high tone, stereo
fn two_tones(low_hz: f32, high_hz: f32, seconds: u64) -> Vec<f32> {
    let duration = Duration::from_secs(seconds);
    let mut low = ToneStream::new(low_hz, duration, SAMPLE_RATE, 2).amplitude(0.25);
    let mut high = ToneStream::new(high_hz, duration, SAMPLE_RATE, 2).amplitude(0.25);

    let len = SAMPLE_RATE as usize * seconds as usize * 2;
    let mut a = vec![0.0; len];
    let mut b = vec![0.0; len];
    assert_eq!(low.read(&mut a).unwrap(), len);
    assert_eq!(high.read(&mut b).unwrap(), len);
    a.iter().zip(b.iter()).map(|(x, y)| x + y).collect()
}

/// Push `signal` block by block through the equalizer and analyzer
fn run(eq: &mut Equalizer, signal: &[f32]) -> Vec<SpectrumFrame> {
    let mut analyzer = SpectrumAnalyzer::new(SpectrumConfig::default()).unwrap();
    analyzer.set_format(SAMPLE_RATE, 2).unwrap();

    let mut frames = Vec::new();
    for block in signal.chunks(BLOCK) {
        let mut block = block.to_vec();
        eq.process(&mut block, SAMPLE_RATE, 2);
        if let Some(frame) = analyzer.push_samples(&block) {
            frames.push(frame);
        }
    }
    frames
}

/// Bucket holding `frequency` under the default analyzer layout
fn bucket_for(frequency: f32) -> usize {
    let config = SpectrumConfig::default();
    let nyquist = SAMPLE_RATE as f32 / 2.0;
    let ratio = nyquist / config.min_frequency_hz;
    let position = (frequency / config.min_frequency_hz).ln() / ratio.ln();
    ((position * config.buckets as f32) as usize).min(config.buckets - 1)
}

/// Strongest level within one bucket of `frequency`
fn level_near(frame: &SpectrumFrame, frequency: f32) -> f32 {
    let center = bucket_for(frequency);
    let lo = center.saturating_sub(1);
    let hi = (center + 1).min(frame.bucket_count() - 1);
    frame.magnitudes()[lo..=hi]
        .iter()
        .copied()
        .fold(0.0, f32::max)
}

// ===== Tests =====

#[test]
fn flat_eq_shows_both_tones() {
    let signal = two_tones(250.0, 4000.0, 1);
    let mut eq = Equalizer::new();
    let frames = run(&mut eq, &signal);
    let last = frames.last().unwrap();

    let low = level_near(last, 250.0);
    let high = level_near(last, 4000.0);
    assert!(low > 0.5, "low tone level {low}");
    assert!(high > 0.5, "high tone level {high}");
}

#[test]
fn band_cut_is_visible_in_spectrum() {
    let signal = two_tones(250.0, 4000.0, 1);
    let mut eq = Equalizer::new();
    // 4 kHz band
    eq.set_band_gain(7, -12.0).unwrap();

    let frames = run(&mut eq, &signal);
    let last = frames.last().unwrap();

    let low = level_near(last, 250.0);
    let high = level_near(last, 4000.0);
    assert!(
        high < low * 0.5,
        "4 kHz should sit well below 250 Hz after a 12 dB cut (low {low}, high {high})"
    );
}

#[test]
fn bass_boost_lifts_low_end() {
    let signal = two_tones(60.0, 4000.0, 1);

    let mut flat = Equalizer::new();
    let flat_frames = run(&mut flat, &signal);
    let flat_last = flat_frames.last().unwrap();

    let mut boosted = Equalizer::new();
    boosted.set_bass_boost(12.0).unwrap();
    let boosted_frames = run(&mut boosted, &signal);
    let boosted_last = boosted_frames.last().unwrap();

    let flat_ratio = level_near(flat_last, 4000.0) / level_near(flat_last, 60.0);
    let boosted_ratio = level_near(boosted_last, 4000.0) / level_near(boosted_last, 60.0);
    assert!(boosted_ratio < flat_ratio * 0.6);
}

#[test]
fn disabled_eq_leaves_spectrum_unchanged() {
    let signal = two_tones(250.0, 4000.0, 1);

    let mut reference = Equalizer::new();
    reference.set_enabled(false);
    let expected = run(&mut reference, &signal);

    let mut eq = Equalizer::new();
    eq.set_preset(EqPreset::Electronic);
    eq.set_enabled(false);
    let actual = run(&mut eq, &signal);

    assert_eq!(expected, actual);
}

#[test]
fn frame_timestamps_follow_sample_clock() {
    let signal = two_tones(250.0, 4000.0, 1);
    let mut eq = Equalizer::new();
    let frames = run(&mut eq, &signal);

    let window = SpectrumConfig::default().window_size as f64 / SAMPLE_RATE as f64;
    assert_eq!(frames.len(), SAMPLE_RATE as usize / 2048);
    for (i, frame) in frames.iter().enumerate() {
        assert!((frame.timestamp() - i as f64 * window).abs() < 1e-9);
    }
}
