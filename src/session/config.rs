use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::{SegmenterConfig, TapConfig};
use crate::provider::{ControllerConfig, RecognizerConfig};

/// Configuration for a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Base URL of the local transcription backend
    pub backend_url: String,

    /// Health probe timeout in milliseconds
    pub probe_timeout_ms: u64,

    /// Per-segment upload timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Interim stream request timeout in milliseconds
    pub stream_timeout_ms: u64,

    /// Emit interim text from the open segment via the streaming endpoint
    pub stream_interim: bool,

    /// Cadence of interim stream requests in milliseconds
    pub interim_interval_ms: u64,

    /// RMS level in dBFS separating voiced from silent ticks
    pub energy_threshold_db: f32,

    /// Silence duration that finalizes a segment
    pub silence_delay_ms: u64,

    /// Hard bound on segment duration regardless of silence
    pub max_segment_ms: u64,

    /// Sample rate for capture (the backend expects 16kHz)
    pub sample_rate: u32,

    /// Number of audio channels (the pipeline expects mono)
    pub channels: u16,

    /// Analysis tick granularity in milliseconds
    pub frame_ms: u64,

    /// Fixed language tag for the native recognizer
    pub language: String,

    /// Debounce before the first native restart attempt, in milliseconds
    pub restart_delay_ms: u64,

    /// Delay before the single native restart retry, in milliseconds
    pub restart_retry_delay_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://localhost:5000".to_string(),
            probe_timeout_ms: 2000,
            request_timeout_ms: 30_000,
            stream_timeout_ms: 10_000,
            stream_interim: false,
            interim_interval_ms: 2000,
            energy_threshold_db: -40.0,
            silence_delay_ms: 1500, // Finalize after 1.5s of silence
            max_segment_ms: 30_000,
            sample_rate: 16000, // 16kHz mono for the backend
            channels: 1,
            frame_ms: 100,
            language: "en-US".to_string(),
            restart_delay_ms: 100,
            restart_retry_delay_ms: 500,
        }
    }
}

impl CaptureConfig {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_millis(self.stream_timeout_ms)
    }

    pub fn tap_config(&self) -> TapConfig {
        TapConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            frame_ms: self.frame_ms,
        }
    }

    pub fn segmenter_config(&self) -> SegmenterConfig {
        SegmenterConfig {
            energy_threshold_db: self.energy_threshold_db,
            silence_delay_ms: self.silence_delay_ms,
            max_segment_ms: self.max_segment_ms,
        }
    }

    pub fn recognizer_config(&self) -> RecognizerConfig {
        RecognizerConfig {
            language: self.language.clone(),
            continuous: true,
            interim_results: true,
        }
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            restart_delay_ms: self.restart_delay_ms,
            restart_retry_delay_ms: self.restart_retry_delay_ms,
        }
    }
}
