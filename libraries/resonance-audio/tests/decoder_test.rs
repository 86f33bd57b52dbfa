//! Decoding real WAV files written with hound

use resonance_audio::{AudioError, FileResolver, SampleStream, SourceResolver, SymphoniaStream};
use resonance_core::SourceRef;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

// ===== Test Helpers =====

/// Write a mono 16-bit sine WAV
fn write_wav(path: &Path, sample_rate: u32, seconds: f32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    let frames = (sample_rate as f32 * seconds) as u32;
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin() * 0.5;
        writer.write_sample((sample * i16::MAX as f32) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

fn read_all(stream: &mut dyn SampleStream) -> Vec<f32> {
    let mut out = Vec::new();
    let mut buf = vec![0.0; 4096];
    loop {
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

// ===== Tests =====

#[test]
fn decodes_mono_wav_as_stereo() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, 22_050, 1.0);

    let mut stream = SymphoniaStream::open(&path, None).unwrap();
    assert_eq!(stream.sample_rate(), 22_050);
    assert_eq!(stream.channels(), 2);

    let duration = stream.duration().unwrap();
    assert!((duration.as_secs_f64() - 1.0).abs() < 0.01);

    let samples = read_all(&mut stream);
    assert_eq!(samples.len(), 22_050 * 2);
    // Mono is duplicated into both channels
    for frame in samples.chunks_exact(2) {
        assert_eq!(frame[0], frame[1]);
    }
    assert!(samples.iter().all(|s| s.abs() <= 1.0));
}

#[test]
fn seek_skips_audio() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, 8_000, 2.0);

    let full = read_all(&mut SymphoniaStream::open(&path, None).unwrap());
    assert_eq!(full.len(), 16_000 * 2);

    let mut stream = SymphoniaStream::open(&path, None).unwrap();
    stream.seek(Duration::from_secs(1)).unwrap();
    let after = read_all(&mut stream);
    assert_eq!(after.len() / 2, 8_000, "seek should land on the requested frame");
    assert_eq!(after, full[8_000 * 2..]);
}

#[test]
fn seek_between_packets_lands_exactly() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, 8_000, 2.0);

    let full = read_all(&mut SymphoniaStream::open(&path, None).unwrap());
    let mut stream = SymphoniaStream::open(&path, None).unwrap();

    // Reading first, then seeking backwards, drops what was buffered
    let mut buf = vec![0.0; 1024];
    stream.read(&mut buf).unwrap();
    stream.seek(Duration::from_millis(250)).unwrap();
    let after = read_all(&mut stream);
    assert_eq!(after, full[2_000 * 2..]);
}

#[test]
fn resampled_seek_lands_near_target() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, 22_050, 2.0);

    let mut stream = SymphoniaStream::open(&path, Some(44_100)).unwrap();
    stream.seek(Duration::from_secs(1)).unwrap();
    let frames = read_all(&mut stream).len() / 2;
    let expected = 44_100.0;
    assert!(
        (frames as f64 - expected).abs() / expected < 0.05,
        "expected about one second after seek, got {frames} frames"
    );
}

#[test]
fn resamples_to_requested_rate() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tone.wav");
    write_wav(&path, 22_050, 1.0);

    let resolver = FileResolver::with_output_sample_rate(44_100);
    let mut stream = resolver
        .open(&SourceRef::from(path.as_path()))
        .unwrap();
    assert_eq!(stream.sample_rate(), 44_100);

    let frames = read_all(stream.as_mut()).len() / 2;
    let expected = 44_100.0;
    assert!(
        (frames as f64 - expected).abs() / expected < 0.1,
        "resampled to {frames} frames"
    );
}

#[test]
fn non_audio_file_is_unavailable() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, "not audio at all").unwrap();

    let result = FileResolver::new().open(&SourceRef::from(path.as_path()));
    assert!(matches!(result, Err(AudioError::SourceUnavailable { .. })));
}
