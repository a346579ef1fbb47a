use anyhow::Result;
use tokio::sync::mpsc;

/// Audio sample data delivered by a tap (16-bit PCM, mono)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (taps normalize to mono)
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Duration covered by this frame's samples.
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / (self.sample_rate as u64 * self.channels.max(1) as u64)
    }
}

/// Configuration for an audio tap
#[derive(Debug, Clone)]
pub struct TapConfig {
    /// Target sample rate (will downsample if the device differs)
    pub sample_rate: u32,
    /// Target channel count (the pipeline expects mono)
    pub channels: u16,
    /// Frame size in milliseconds (analysis tick granularity)
    pub frame_ms: u64,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz for the transcription backend
            channels: 1,        // Mono
            frame_ms: 100,      // 100ms analysis ticks
        }
    }
}

impl TapConfig {
    /// Samples per emitted frame at the configured rate.
    pub fn samples_per_frame(&self) -> usize {
        (self.sample_rate as u64 * self.channels.max(1) as u64 * self.frame_ms / 1000) as usize
    }
}

/// Live audio tap
///
/// Implementations:
/// - Microphone: cpal capture on a dedicated thread (all platforms)
/// - File: read from a WAV file (for demos/batch processing)
#[async_trait::async_trait]
pub trait AudioTap: Send {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    async fn stop(&mut self) -> Result<()>;

    /// Check if the tap is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get tap name for logging
    fn name(&self) -> &str;
}

/// Audio tap source
#[derive(Debug, Clone)]
pub enum TapSource {
    /// Microphone input
    Microphone,
    /// WAV file input (for demos/batch processing)
    File(std::path::PathBuf),
}

/// Audio tap factory
pub struct AudioTapFactory;

impl AudioTapFactory {
    /// Create an audio tap for the given source
    pub fn create(source: TapSource, config: TapConfig) -> Result<Box<dyn AudioTap>> {
        match source {
            TapSource::Microphone => {
                let tap = super::device::MicrophoneTap::new(config);
                Ok(Box::new(tap))
            }
            TapSource::File(path) => {
                let tap = super::file::FileTap::new(path, config);
                Ok(Box::new(tap))
            }
        }
    }
}

/// Downsample by decimation (take every Nth sample)
pub(crate) fn downsample(samples: Vec<i16>, source_rate: u32, target_rate: u32) -> Vec<i16> {
    if source_rate <= target_rate || target_rate == 0 {
        return samples;
    }

    let ratio = source_rate / target_rate;
    if ratio <= 1 {
        return samples;
    }

    samples.iter().step_by(ratio as usize).copied().collect()
}

/// Convert interleaved multi-channel samples to mono by summing channels
pub(crate) fn downmix_to_mono(samples: Vec<i16>, channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples;
    }

    let channels = channels as usize;
    let mut mono = Vec::with_capacity(samples.len() / channels);

    for chunk in samples.chunks_exact(channels) {
        let sum: i32 = chunk.iter().map(|&s| s as i32).sum();
        mono.push((sum / channels as i32).clamp(i16::MIN as i32, i16::MAX as i32) as i16);
    }

    mono
}
