use std::fmt;
use tokio::sync::mpsc;

use crate::session::CaptureError;

/// Events pushed by a continuous recognizer
#[derive(Debug, Clone)]
pub enum RecognizerEvent {
    /// The engine began listening
    Started,
    /// A recognition hypothesis; unstable until `is_final`
    Result {
        index: usize,
        is_final: bool,
        text: String,
        confidence: Option<f32>,
    },
    /// Engine error, identified by its code string
    Error(String),
    /// The engine stopped listening
    Ended,
}

/// Failure starting (or restarting) a recognizer
#[derive(Debug)]
pub enum StartError {
    /// The engine reports it is already listening. Restart logic treats
    /// this as success.
    AlreadyRunning,
    Failed(String),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartError::AlreadyRunning => write!(f, "recognizer already running"),
            StartError::Failed(message) => write!(f, "recognizer failed to start: {message}"),
        }
    }
}

impl std::error::Error for StartError {}

/// Settings handed to the runtime recognizer
#[derive(Debug, Clone)]
pub struct RecognizerConfig {
    /// Fixed language tag for the whole session
    pub language: String,
    pub continuous: bool,
    pub interim_results: bool,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            continuous: true,
            interim_results: true,
        }
    }
}

/// A continuously-listening recognition engine provided by the runtime.
///
/// Implementations deliver events through the channel handed out at
/// creation; `start()` may be called again after an end-of-stream to resume
/// listening on the same channel.
#[async_trait::async_trait]
pub trait ContinuousRecognizer: Send {
    /// Begin (or resume) listening
    async fn start(&mut self) -> Result<(), StartError>;

    /// Stop listening and release engine resources
    async fn stop(&mut self);

    /// Engine name for logging
    fn name(&self) -> &str;
}

/// Runtime capability that can supply a continuous recognizer.
///
/// Hosts without a speech engine simply don't install one; the session
/// treats its absence the same way it treats an unreachable local backend.
pub trait NativeRecognizerProvider: Send + Sync {
    fn is_available(&self) -> bool;

    fn create(
        &self,
        config: &RecognizerConfig,
    ) -> anyhow::Result<(Box<dyn ContinuousRecognizer>, mpsc::Receiver<RecognizerEvent>)>;
}

/// Codes that occur in normal operation and never affect the session.
pub fn is_benign_code(code: &str) -> bool {
    matches!(code, "no-speech" | "aborted")
}

/// Codes that terminate the session.
pub fn fatal_error(code: &str) -> Option<CaptureError> {
    match code {
        "not-allowed" => Some(CaptureError::PermissionDenied),
        "service-not-allowed" => Some(CaptureError::ServiceNotAllowed),
        _ => None,
    }
}
