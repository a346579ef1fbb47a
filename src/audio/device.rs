//! Microphone tap backed by cpal
//!
//! cpal streams are not `Send`, so the stream lives on a dedicated capture
//! thread. Samples are normalized to mono i16 at the configured rate and
//! forwarded to the pipeline as fixed-size analysis frames.

use anyhow::{bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::tap::{downmix_to_mono, downsample, AudioFrame, AudioTap, TapConfig};

pub struct MicrophoneTap {
    config: TapConfig,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl MicrophoneTap {
    pub fn new(config: TapConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioTap for MicrophoneTap {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.worker.is_some() {
            bail!("microphone tap already started");
        }

        let (tx, rx) = mpsc::channel(128);
        let (ready_tx, ready_rx) = oneshot::channel();

        self.running.store(true, Ordering::SeqCst);

        let config = self.config.clone();
        let running = Arc::clone(&self.running);
        let handle = thread::spawn(move || capture_thread(config, tx, ready_tx, running));
        self.worker = Some(handle);

        // The thread reports whether the device actually opened.
        match ready_rx.await {
            Ok(Ok(())) => {
                info!("Microphone capture started");
                Ok(rx)
            }
            Ok(Err(message)) => {
                self.running.store(false, Ordering::SeqCst);
                self.worker = None;
                bail!("{message}")
            }
            Err(_) => {
                self.running.store(false, Ordering::SeqCst);
                self.worker = None;
                bail!("microphone capture thread exited before opening the device")
            }
        }
    }

    async fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);

        if let Some(handle) = self.worker.take() {
            tokio::task::spawn_blocking(move || {
                if handle.join().is_err() {
                    warn!("microphone capture thread panicked");
                }
            })
            .await
            .context("failed to join microphone capture thread")?;
        }

        info!("Microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.worker.is_some() && self.running.load(Ordering::SeqCst)
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

impl Drop for MicrophoneTap {
    fn drop(&mut self) {
        // Signal the capture thread even if stop() was never awaited.
        self.running.store(false, Ordering::SeqCst);
    }
}

fn capture_thread(
    config: TapConfig,
    tx: mpsc::Sender<AudioFrame>,
    ready: oneshot::Sender<std::result::Result<(), String>>,
    running: Arc<AtomicBool>,
) {
    let host = cpal::default_host();

    let Some(device) = host.default_input_device() else {
        let _ = ready.send(Err(
            "no default input device available; check microphone permissions".to_string(),
        ));
        return;
    };

    let device_name = device
        .name()
        .unwrap_or_else(|_| "unknown input device".to_string());

    let default_config = match device.default_input_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            let _ = ready.send(Err(format!(
                "failed to query input config for '{device_name}': {e}"
            )));
            return;
        }
    };

    let format = default_config.sample_format();
    let device_config: StreamConfig = default_config.into();
    let device_rate = device_config.sample_rate.0;
    let device_channels = device_config.channels;

    debug!(
        "Opening '{}': format={:?} rate={}Hz channels={}",
        device_name, format, device_rate, device_channels
    );

    let err_fn = |err| warn!("audio stream error: {err}");

    // Convert every supported sample type to i16 up front so the rest of the
    // pipeline stays format-agnostic.
    let stream = match format {
        SampleFormat::F32 => {
            let mut assembler = FrameAssembler::new(&config, device_rate, device_channels, tx);
            device.build_input_stream(
                &device_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    assembler.push(data.iter().map(|&s| {
                        (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
                    }));
                },
                err_fn,
                None,
            )
        }
        SampleFormat::I16 => {
            let mut assembler = FrameAssembler::new(&config, device_rate, device_channels, tx);
            device.build_input_stream(
                &device_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    assembler.push(data.iter().copied());
                },
                err_fn,
                None,
            )
        }
        SampleFormat::U16 => {
            let mut assembler = FrameAssembler::new(&config, device_rate, device_channels, tx);
            device.build_input_stream(
                &device_config,
                move |data: &[u16], _: &cpal::InputCallbackInfo| {
                    assembler.push(data.iter().map(|&s| (s as i32 - 32_768) as i16));
                },
                err_fn,
                None,
            )
        }
        other => {
            let _ = ready.send(Err(format!("unsupported sample format: {other:?}")));
            return;
        }
    };

    let stream = match stream {
        Ok(s) => s,
        Err(e) => {
            let _ = ready.send(Err(format!(
                "failed to open input stream on '{device_name}': {e}"
            )));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(format!("failed to start input stream: {e}")));
        return;
    }

    let _ = ready.send(Ok(()));

    // Hold the stream alive until the tap is stopped.
    while running.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(25));
    }

    drop(stream);
}

/// Buffers raw device samples and emits fixed-duration mono frames.
struct FrameAssembler {
    target: TapConfig,
    device_rate: u32,
    device_channels: u16,
    samples_per_chunk: usize,
    buffer: Vec<i16>,
    next_timestamp_ms: u64,
    tx: mpsc::Sender<AudioFrame>,
}

impl FrameAssembler {
    fn new(
        target: &TapConfig,
        device_rate: u32,
        device_channels: u16,
        tx: mpsc::Sender<AudioFrame>,
    ) -> Self {
        let samples_per_chunk =
            (device_rate as u64 * device_channels.max(1) as u64 * target.frame_ms / 1000) as usize;

        Self {
            target: target.clone(),
            device_rate,
            device_channels,
            samples_per_chunk: samples_per_chunk.max(1),
            buffer: Vec::with_capacity(samples_per_chunk.max(1) * 2),
            next_timestamp_ms: 0,
            tx,
        }
    }

    fn push(&mut self, samples: impl Iterator<Item = i16>) {
        self.buffer.extend(samples);

        while self.buffer.len() >= self.samples_per_chunk {
            let raw: Vec<i16> = self.buffer.drain(..self.samples_per_chunk).collect();
            let mono = downmix_to_mono(raw, self.device_channels);
            let samples = downsample(mono, self.device_rate, self.target.sample_rate);

            let frame = AudioFrame {
                samples,
                sample_rate: self.target.sample_rate,
                channels: 1,
                timestamp_ms: self.next_timestamp_ms,
            };
            self.next_timestamp_ms += self.target.frame_ms;

            match self.tx.try_send(frame) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("dropping audio frame; pipeline is behind");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }
}
