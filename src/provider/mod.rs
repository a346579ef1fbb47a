//! Speech-to-text providers
//!
//! Two mutually exclusive backends sit behind one session surface:
//! - Local: an HTTP transcription service fed finalized audio segments
//! - Native: a runtime-provided continuous recognizer pushing events
//!
//! The probe picks one per session; the choice never changes mid-session.

pub mod controller;
pub mod local;
pub mod native;
pub mod probe;

pub use controller::{ControllerConfig, RecognitionController};
pub use local::TranscriptionClient;
pub use native::{
    ContinuousRecognizer, NativeRecognizerProvider, RecognizerConfig, RecognizerEvent, StartError,
};
pub use probe::{ProbeReport, ProviderProbe};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The backend performing speech-to-text for the current session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Local HTTP transcription service
    Local,
    /// Runtime continuous recognizer
    Native,
}

impl Provider {
    pub fn label(self) -> &'static str {
        match self {
            Provider::Local => "local",
            Provider::Native => "native",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which backend a session locked in, and why
#[derive(Debug, Clone)]
pub struct ProviderDecision {
    pub provider: Provider,
    /// How long the readiness probe took
    pub probe_latency: Duration,
    /// Human-readable reason for the choice
    pub reason: String,
}

/// Word-level timing reported by the local backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordTiming {
    pub word: String,
    /// Offset from segment start, in seconds
    pub start: f64,
    pub end: f64,
    pub confidence: f32,
}

/// A finalized transcript, passed by value to the consumer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    pub source: Provider,
    pub language: Option<String>,
    pub words: Option<Vec<WordTiming>>,
    pub confidence: f32,
}
