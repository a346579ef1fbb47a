use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::tap::{downmix_to_mono, downsample, AudioFrame, AudioTap, TapConfig};

/// Audio tap that replays a WAV file as a live frame stream.
///
/// Used by the demos and batch runs in place of a microphone. Frames carry
/// synthetic timestamps on the configured tick, so the segmenter behaves
/// exactly as it would on live input. The frame channel is held open after
/// the file is exhausted; capture ends when the session stops.
pub struct FileTap {
    path: PathBuf,
    config: TapConfig,
    shutdown: Option<watch::Sender<bool>>,
    worker: Option<JoinHandle<()>>,
}

impl FileTap {
    pub fn new(path: PathBuf, config: TapConfig) -> Self {
        Self {
            path,
            config,
            shutdown: None,
            worker: None,
        }
    }

    fn read_frames(&self) -> Result<Vec<AudioFrame>> {
        let reader = hound::WavReader::open(&self.path)
            .with_context(|| format!("failed to open WAV file: {:?}", self.path))?;
        let spec = reader.spec();

        let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => reader
                .into_samples::<i16>()
                .collect::<std::result::Result<_, _>>()
                .context("failed to read WAV samples")?,
            (hound::SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<std::result::Result<_, _>>()
                .context("failed to read WAV samples")?,
            (format, bits) => bail!("unsupported WAV format: {:?} {}-bit", format, bits),
        };

        let mono = downmix_to_mono(samples, spec.channels);
        let mono = downsample(mono, spec.sample_rate, self.config.sample_rate);

        let samples_per_frame = self.config.samples_per_frame().max(1);
        let frames = mono
            .chunks(samples_per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.config.sample_rate,
                channels: 1,
                timestamp_ms: i as u64 * self.config.frame_ms,
            })
            .collect();

        Ok(frames)
    }
}

#[async_trait::async_trait]
impl AudioTap for FileTap {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.worker.is_some() {
            bail!("file tap already started");
        }

        let frames = self.read_frames()?;
        info!(
            "File tap ready: {:?} ({} frames of {}ms)",
            self.path,
            frames.len(),
            self.config.frame_ms
        );

        let (tx, rx) = mpsc::channel(128);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let worker = tokio::spawn(async move {
            for frame in frames {
                tokio::select! {
                    _ = shutdown_rx.changed() => return,
                    sent = tx.send(frame) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }

            // Keep the channel open until the session stops.
            let _ = shutdown_rx.changed().await;
        });

        self.shutdown = Some(shutdown_tx);
        self.worker = Some(worker);

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }

        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                warn!("file tap task panicked: {}", e);
            }
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.worker.is_some()
    }

    fn name(&self) -> &str {
        "file"
    }
}
