//! CPAL output sink
//!
//! `cpal::Stream` is not `Send`, so the stream lives on a dedicated thread for
//! its whole life. Rendered blocks reach the device callback through a bounded
//! crossbeam channel; a full channel is reported as backpressure. Played
//! buffers travel back on a second channel and are refilled by `write`, so the
//! callback neither allocates nor frees.

use crate::error::{AudioError, Result};
use crate::sink::OutputSink;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, StreamConfig};
use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

const OUTPUT_CHANNELS: usize = 2;

/// Blocks in flight between the engine and the device callback
const BLOCK_QUEUE_CAPACITY: usize = 32;

/// Queued blocks, the one playing and the one being filled
const SPENT_QUEUE_CAPACITY: usize = BLOCK_QUEUE_CAPACITY + 2;

/// Rendered samples tagged with the discard generation they belong to
struct Block {
    generation: u64,
    samples: Vec<f32>,
}

/// Sink playing through the default output device
pub struct CpalSink {
    blocks: Sender<Block>,
    spent: Receiver<Vec<f32>>,
    shutdown: Option<Sender<()>>,
    generation: Arc<AtomicU64>,
    sample_rate: u32,
    thread: Option<JoinHandle<()>>,
}

impl CpalSink {
    /// Open the default output device at its default rate, stereo f32
    pub fn open_default() -> Result<Self> {
        let (block_tx, block_rx) = bounded::<Block>(BLOCK_QUEUE_CAPACITY);
        let (spent_tx, spent_rx) = bounded::<Vec<f32>>(SPENT_QUEUE_CAPACITY);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<Result<u32>>(1);
        let generation = Arc::new(AtomicU64::new(0));

        let callback_generation = Arc::clone(&generation);
        let thread = thread::Builder::new()
            .name("resonance-output".into())
            .spawn(move || {
                let playhead = Playhead::new(block_rx, spent_tx, callback_generation);
                let stream = match build_stream(playhead) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Park until the sink is dropped
                let _ = shutdown_rx.recv();
                drop(stream);
                tracing::debug!("Output stream closed");
            })?;

        let sample_rate = ready_rx
            .recv()
            .map_err(|_| AudioError::Output("output thread exited during setup".into()))??;

        tracing::info!(sample_rate, "Opened default output device");

        Ok(Self {
            blocks: block_tx,
            spent: spent_rx,
            shutdown: Some(shutdown_tx),
            generation,
            sample_rate,
            thread: Some(thread),
        })
    }
}

/// Callback-side reader over the block queue
struct Playhead {
    blocks: Receiver<Block>,
    spent: Sender<Vec<f32>>,
    generation: Arc<AtomicU64>,
    current: Vec<f32>,
    cursor: usize,
}

impl Playhead {
    fn new(blocks: Receiver<Block>, spent: Sender<Vec<f32>>, generation: Arc<AtomicU64>) -> Self {
        Self {
            blocks,
            spent,
            generation,
            current: Vec::new(),
            cursor: 0,
        }
    }

    /// Fill `data` from queued blocks, padding with silence when they run out
    fn fill(&mut self, data: &mut [f32]) {
        let live = self.generation.load(Ordering::Acquire);
        for sample in data.iter_mut() {
            while self.cursor >= self.current.len() {
                match self.blocks.try_recv() {
                    Ok(block) if block.generation == live => {
                        let played = std::mem::replace(&mut self.current, block.samples);
                        self.recycle(played);
                        self.cursor = 0;
                    }
                    // Stale block from before a discard
                    Ok(block) => self.recycle(block.samples),
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                }
            }
            if self.cursor < self.current.len() {
                *sample = self.current[self.cursor];
                self.cursor += 1;
            } else {
                *sample = 0.0;
            }
        }
    }

    fn recycle(&self, buffer: Vec<f32>) {
        if buffer.capacity() == 0 {
            return;
        }
        // Only fails once the sink is gone
        let _ = self.spent.try_send(buffer);
    }
}

fn build_stream(mut playhead: Playhead) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::Output("no output device available".into()))?;
    let default_config = device
        .default_output_config()
        .map_err(|e| AudioError::Output(format!("failed to get default config: {e}")))?;
    let sample_rate = default_config.sample_rate();

    let config = StreamConfig {
        channels: OUTPUT_CHANNELS as u16,
        sample_rate,
        buffer_size: BufferSize::Default,
    };

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _| playhead.fill(data),
            |err| tracing::error!(error = %err, "Audio stream error"),
            None,
        )
        .map_err(|e| AudioError::Output(format!("failed to build stream: {e}")))?;

    stream
        .play()
        .map_err(|e| AudioError::Output(format!("failed to start stream: {e}")))?;

    Ok((stream, sample_rate))
}

impl OutputSink for CpalSink {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> usize {
        OUTPUT_CHANNELS
    }

    fn write(&mut self, samples: &[f32]) -> Result<usize> {
        let whole = samples.len() / OUTPUT_CHANNELS * OUTPUT_CHANNELS;
        if whole == 0 {
            return Ok(0);
        }
        let block = Block {
            generation: self.generation.load(Ordering::Acquire),
            samples: refill(&self.spent, &samples[..whole]),
        };
        match self.blocks.try_send(block) {
            Ok(()) => Ok(whole),
            Err(TrySendError::Full(_)) => Ok(0),
            Err(TrySendError::Disconnected(_)) => {
                Err(AudioError::Output("output stream has stopped".into()))
            }
        }
    }

    fn discard(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

/// Copy `samples` into a returned buffer, allocating only when none is free
fn refill(spent: &Receiver<Vec<f32>>, samples: &[f32]) -> Vec<f32> {
    match spent.try_recv() {
        Ok(mut buffer) => {
            buffer.clear();
            buffer.extend_from_slice(samples);
            buffer
        }
        Err(_) => samples.to_vec(),
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
