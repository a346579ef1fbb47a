use tracing::debug;

use super::tap::AudioFrame;
use crate::timer::Countdown;

/// A bounded span of captured audio, delimited by voice/silence boundaries,
/// transcribed as a single unit.
#[derive(Debug, Clone)]
pub struct AudioSegment {
    /// Raw audio samples (i16 PCM, mono)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Start time in milliseconds since capture started
    pub start_ms: u64,
    /// End time in milliseconds since capture started
    pub end_ms: u64,
}

impl AudioSegment {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Configuration for voice-activity segmentation
#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// RMS level in dBFS separating voiced from silent ticks
    pub energy_threshold_db: f32,
    /// Continuous below-threshold time that finalizes a segment
    pub silence_delay_ms: u64,
    /// Hard bound on segment duration regardless of silence
    pub max_segment_ms: u64,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            energy_threshold_db: -40.0,
            silence_delay_ms: 1500,
            max_segment_ms: 30_000,
        }
    }
}

struct OpenSegment {
    samples: Vec<i16>,
    sample_rate: u32,
    start_ms: u64,
    voiced: bool,
}

/// Classifies analysis ticks as voiced or silent by RMS energy and emits a
/// finalized segment once a voiced period is followed by the configured
/// silence window.
///
/// The segmenter is clocked entirely by frame timestamps; it holds at most
/// one open segment and one pending silence deadline at a time. Episodes
/// that never crossed the energy threshold are dropped without being
/// emitted.
pub struct VoiceSegmenter {
    config: SegmenterConfig,
    silence: Countdown,
    open: Option<OpenSegment>,
}

impl VoiceSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        let silence = Countdown::new(config.silence_delay_ms);
        Self {
            config,
            silence,
            open: None,
        }
    }

    /// Feed one analysis tick. Returns a finalized segment when a boundary
    /// was reached before this tick.
    pub fn advance(&mut self, frame: &AudioFrame) -> Option<AudioSegment> {
        let now = frame.timestamp_ms;

        let finalized = if self
            .open
            .as_ref()
            .is_some_and(|open| now.saturating_sub(open.start_ms) >= self.config.max_segment_ms)
        {
            // Hard cap: bound memory and latency even under uninterrupted speech.
            self.close(now)
        } else if self.silence.expired(now) {
            // The segment ends at the debounce deadline, not at this tick.
            let deadline = self.silence.deadline().unwrap_or(now);
            self.close(deadline)
        } else {
            None
        };

        self.ingest(frame);
        finalized
    }

    /// Discard any open segment and pending deadline. Called when the
    /// pipeline re-arms after an upload.
    pub fn reset(&mut self) {
        self.silence.cancel();
        self.open = None;
    }

    pub fn has_open_segment(&self) -> bool {
        self.open.is_some()
    }

    /// Samples accumulated in the open segment so far, if it has crossed the
    /// energy threshold. Used for interim streaming.
    pub fn open_voiced_samples(&self) -> Option<(&[i16], u32)> {
        self.open
            .as_ref()
            .filter(|open| open.voiced && !open.samples.is_empty())
            .map(|open| (open.samples.as_slice(), open.sample_rate))
    }

    fn ingest(&mut self, frame: &AudioFrame) {
        let now = frame.timestamp_ms;
        let open = self.open.get_or_insert_with(|| OpenSegment {
            samples: Vec::new(),
            sample_rate: frame.sample_rate,
            start_ms: now,
            voiced: false,
        });

        open.samples.extend_from_slice(&frame.samples);

        if rms_dbfs(&frame.samples) >= self.config.energy_threshold_db {
            open.voiced = true;
            // Speech resumed; a brief dip must not truncate the segment.
            self.silence.cancel();
        } else {
            self.silence.arm_if_idle(now);
        }
    }

    fn close(&mut self, end_ms: u64) -> Option<AudioSegment> {
        self.silence.cancel();
        let open = self.open.take()?;

        if !open.voiced || open.samples.is_empty() {
            debug!(
                "discarding silent episode [{}ms..{}ms]",
                open.start_ms, end_ms
            );
            return None;
        }

        Some(AudioSegment {
            samples: open.samples,
            sample_rate: open.sample_rate,
            start_ms: open.start_ms,
            end_ms,
        })
    }
}

/// RMS level of a block of samples in dBFS. Digital silence maps to -inf.
pub fn rms_dbfs(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return f32::NEG_INFINITY;
    }

    let sum: f64 = samples
        .iter()
        .map(|&s| {
            let x = s as f64 / i16::MAX as f64;
            x * x
        })
        .sum();
    let rms = (sum / samples.len() as f64).sqrt();

    if rms <= 0.0 {
        f32::NEG_INFINITY
    } else {
        (20.0 * rms.log10()) as f32
    }
}
