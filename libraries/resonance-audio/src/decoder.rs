//! File decoding through Symphonia
//!
//! Streams packets on demand instead of decoding whole files, converts every
//! Symphonia sample format to interleaved stereo f32, and optionally resamples
//! to a fixed output rate with rubato.

use crate::error::{AudioError, Result};
use crate::source::{SampleStream, SourceResolver};
use resonance_core::SourceRef;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::collections::VecDeque;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use symphonia::core::units::TimeBase;

/// Decoded output is always interleaved stereo
const OUTPUT_CHANNELS: usize = 2;

/// Resampler input chunk, in seconds of source audio
const RESAMPLE_CHUNK_SECONDS: f64 = 0.05;

/// Extensions the file resolver and CLI scanner treat as audio
pub const SUPPORTED_EXTENSIONS: [&str; 8] = ["mp3", "flac", "ogg", "wav", "m4a", "aac", "opus", "oga"];

/// Streaming decoder for a local audio file
pub struct SymphoniaStream {
    path: PathBuf,
    format_reader: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    time_base: TimeBase,
    source_sample_rate: u32,
    output_sample_rate: u32,
    duration: Option<Duration>,

    /// Decoded (and resampled) interleaved stereo awaiting `read`
    buffer: VecDeque<f32>,
    /// Scratch for one packet's stereo conversion
    packet: Vec<f32>,
    resampler: Option<StreamResampler>,
    /// Source-rate frames still to drop after a seek landed early
    skip_frames: usize,
    is_eof: bool,
}

impl SymphoniaStream {
    /// Probe `path` and prepare a decoder for its default track
    ///
    /// With `output_sample_rate` set, audio is resampled to that rate when the
    /// file's rate differs.
    pub fn open(path: impl AsRef<Path>, output_sample_rate: Option<u32>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let unavailable = |reason: String| AudioError::unavailable(path.display().to_string(), reason);

        let file = File::open(&path).map_err(|e| unavailable(format!("failed to open file: {e}")))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| unavailable(format!("failed to probe file: {e}")))?;
        let format_reader = probed.format;

        let track = format_reader
            .default_track()
            .ok_or_else(|| unavailable("no audio tracks found".into()))?;

        let source_sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| unavailable("unknown sample rate".into()))?;
        let track_id = track.id;
        let time_base = track
            .codec_params
            .time_base
            .unwrap_or(TimeBase::new(1, source_sample_rate));
        let duration = track
            .codec_params
            .n_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / source_sample_rate as f64));

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| unavailable(format!("failed to create decoder: {e}")))?;

        let output_sample_rate = output_sample_rate.unwrap_or(source_sample_rate);
        let resampler = if output_sample_rate == source_sample_rate {
            None
        } else {
            Some(
                StreamResampler::new(source_sample_rate, output_sample_rate)
                    .map_err(|e| unavailable(e.to_string()))?,
            )
        };

        tracing::debug!(
            path = %path.display(),
            source_sample_rate,
            output_sample_rate,
            ?duration,
            "Opened audio file"
        );

        Ok(Self {
            path,
            format_reader,
            decoder,
            track_id,
            time_base,
            source_sample_rate,
            output_sample_rate,
            duration,
            buffer: VecDeque::new(),
            packet: Vec::new(),
            resampler,
            skip_frames: 0,
            is_eof: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The file's native sample rate
    pub fn source_sample_rate(&self) -> u32 {
        self.source_sample_rate
    }

    /// Decode the next packet of our track into the buffer
    fn decode_next_packet(&mut self) -> Result<()> {
        let packet = match self.format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return self.finish();
            }
            Err(SymphoniaError::ResetRequired) => return self.finish(),
            Err(e) => return Err(AudioError::Decode(format!("error reading packet: {e}"))),
        };

        if packet.track_id() != self.track_id {
            return Ok(());
        }

        let decoded = match self.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt packet; skip it and keep going
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Skipping undecodable packet");
                return Ok(());
            }
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        };

        self.packet.clear();
        convert_to_stereo(decoded, &mut self.packet);

        if self.skip_frames > 0 {
            let frames = (self.packet.len() / OUTPUT_CHANNELS).min(self.skip_frames);
            self.packet.drain(..frames * OUTPUT_CHANNELS);
            self.skip_frames -= frames;
            if self.packet.is_empty() {
                return Ok(());
            }
        }

        match self.resampler.as_mut() {
            Some(resampler) => resampler.push(&self.packet, &mut self.buffer)?,
            None => self.buffer.extend(self.packet.iter().copied()),
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.is_eof = true;
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.flush(&mut self.buffer)?;
        }
        Ok(())
    }
}

impl SampleStream for SymphoniaStream {
    fn sample_rate(&self) -> u32 {
        self.output_sample_rate
    }

    fn channels(&self) -> usize {
        OUTPUT_CHANNELS
    }

    fn read(&mut self, output: &mut [f32]) -> Result<usize> {
        let wanted = output.len() / OUTPUT_CHANNELS * OUTPUT_CHANNELS;
        while self.buffer.len() < wanted && !self.is_eof {
            self.decode_next_packet()?;
        }

        let available = self.buffer.len().min(wanted);
        for (dst, src) in output.iter_mut().zip(self.buffer.drain(..available)) {
            *dst = src;
        }
        Ok(available)
    }

    fn seek(&mut self, position: Duration) -> Result<()> {
        let seek_ts = self.time_base.calc_timestamp(position.into());
        let seeked = self
            .format_reader
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: seek_ts,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| AudioError::Seek(e.to_string()))?;

        // The reader lands on a packet boundary at or before the target
        let early = self
            .time_base
            .calc_time(seeked.required_ts.saturating_sub(seeked.actual_ts));
        let early_secs = early.seconds as f64 + early.frac;
        self.skip_frames = (early_secs * self.source_sample_rate as f64).round() as usize;
        tracing::trace!(
            required_ts = seeked.required_ts,
            actual_ts = seeked.actual_ts,
            skip_frames = self.skip_frames,
            "Seeked"
        );

        self.decoder.reset();
        self.buffer.clear();
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
        self.is_eof = false;
        Ok(())
    }

    fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

/// Resolves source references as filesystem paths
#[derive(Debug, Clone, Default)]
pub struct FileResolver {
    output_sample_rate: Option<u32>,
}

impl FileResolver {
    /// Decode at each file's native rate
    pub fn new() -> Self {
        Self::default()
    }

    /// Resample everything to `sample_rate` (the output device rate)
    pub fn with_output_sample_rate(sample_rate: u32) -> Self {
        Self {
            output_sample_rate: Some(sample_rate),
        }
    }
}

impl SourceResolver for FileResolver {
    fn open(&self, source: &SourceRef) -> Result<Box<dyn SampleStream>> {
        let stream = SymphoniaStream::open(source.as_path(), self.output_sample_rate)?;
        Ok(Box::new(stream))
    }
}

/// Whether `path` has an extension we try to decode
pub fn is_supported_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

/// Append a decoded buffer to `out` as interleaved stereo
///
/// Mono is duplicated; extra channels beyond the first two are dropped.
fn convert_to_stereo(decoded: AudioBufferRef<'_>, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => interleave(&buf, out, |s| s),
        AudioBufferRef::F64(buf) => interleave(&buf, out, |s| s as f32),
        AudioBufferRef::S8(buf) => interleave(&buf, out, |s| s as f32 / i8::MAX as f32),
        AudioBufferRef::S16(buf) => interleave(&buf, out, |s| s as f32 / i16::MAX as f32),
        AudioBufferRef::S24(buf) => interleave(&buf, out, |s| s.inner() as f32 / 8_388_607.0),
        AudioBufferRef::S32(buf) => interleave(&buf, out, |s| s as f32 / i32::MAX as f32),
        AudioBufferRef::U8(buf) => interleave(&buf, out, |s| s as f32 / u8::MAX as f32 * 2.0 - 1.0),
        AudioBufferRef::U16(buf) => {
            interleave(&buf, out, |s| s as f32 / u16::MAX as f32 * 2.0 - 1.0)
        }
        AudioBufferRef::U24(buf) => {
            interleave(&buf, out, |s| s.inner() as f32 / 16_777_215.0 * 2.0 - 1.0)
        }
        AudioBufferRef::U32(buf) => {
            interleave(&buf, out, |s| s as f32 / u32::MAX as f32 * 2.0 - 1.0)
        }
    }
}

fn interleave<T, F>(buf: &AudioBuffer<T>, out: &mut Vec<f32>, normalize: F)
where
    T: Sample,
    F: Fn(T) -> f32,
{
    let channels = buf.spec().channels.count();
    if channels == 0 {
        return;
    }
    let left = buf.chan(0);
    let right = if channels > 1 { buf.chan(1) } else { left };

    out.reserve(buf.frames() * OUTPUT_CHANNELS);
    for (&l, &r) in left.iter().zip(right.iter()) {
        out.push(normalize(l));
        out.push(normalize(r));
    }
}

/// Chunked sinc resampler over an interleaved stereo stream
struct StreamResampler {
    inner: SincFixedIn<f32>,
    /// Planar input not yet resampled
    input: [Vec<f32>; OUTPUT_CHANNELS],
}

impl StreamResampler {
    fn new(from: u32, to: u32) -> Result<Self> {
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let chunk_frames = ((from as f64 * RESAMPLE_CHUNK_SECONDS) as usize).max(64);
        let inner = SincFixedIn::<f32>::new(
            to as f64 / from as f64,
            1.0,
            params,
            chunk_frames,
            OUTPUT_CHANNELS,
        )
        .map_err(|e| AudioError::Decode(format!("failed to create resampler: {e}")))?;

        Ok(Self {
            inner,
            input: [Vec::new(), Vec::new()],
        })
    }

    fn push(&mut self, interleaved: &[f32], out: &mut VecDeque<f32>) -> Result<()> {
        for frame in interleaved.chunks_exact(OUTPUT_CHANNELS) {
            self.input[0].push(frame[0]);
            self.input[1].push(frame[1]);
        }

        loop {
            let needed = self.inner.input_frames_next();
            if self.input[0].len() < needed {
                return Ok(());
            }
            let chunk = [&self.input[0][..needed], &self.input[1][..needed]];
            let resampled = self
                .inner
                .process(&chunk[..], None)
                .map_err(|e| AudioError::Decode(format!("resampling error: {e}")))?;
            append_planar(&resampled, out);
            for channel in &mut self.input {
                channel.drain(..needed);
            }
        }
    }

    /// Resample whatever is left at end of stream
    fn flush(&mut self, out: &mut VecDeque<f32>) -> Result<()> {
        if self.input[0].is_empty() {
            return Ok(());
        }
        let resampled = self
            .inner
            .process_partial(Some(&self.input[..]), None)
            .map_err(|e| AudioError::Decode(format!("resampling error: {e}")))?;
        append_planar(&resampled, out);
        for channel in &mut self.input {
            channel.clear();
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.inner.reset();
        for channel in &mut self.input {
            channel.clear();
        }
    }
}

fn append_planar(planar: &[Vec<f32>], out: &mut VecDeque<f32>) {
    if let [left, right] = planar {
        for (&l, &r) in left.iter().zip(right.iter()) {
            out.push_back(l);
            out.push_back(r);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_implements_sample_stream() {
        fn assert_stream<T: SampleStream>() {}
        assert_stream::<SymphoniaStream>();
    }

    #[test]
    fn missing_file_is_unavailable() {
        let result = SymphoniaStream::open("/definitely/not/here.flac", None);
        assert!(matches!(result, Err(AudioError::SourceUnavailable { .. })));
    }

    #[test]
    fn supported_extensions() {
        assert!(is_supported_file(Path::new("/music/a.FLAC")));
        assert!(is_supported_file(Path::new("b.mp3")));
        assert!(!is_supported_file(Path::new("cover.jpg")));
        assert!(!is_supported_file(Path::new("README")));
    }
}
