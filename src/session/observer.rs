use std::fmt;

use crate::provider::TranscriptResult;

/// Callback surface the transcript consumer implements.
///
/// Two transcript channels — `on_interim` text is unstable and never the
/// transcript of record; finalized text arrives through `on_result` in the
/// order its segments were finalized. Lifecycle signals fire at most once
/// per session. All methods default to no-ops so consumers implement only
/// what they need.
pub trait CaptureObserver: Send + Sync {
    /// A finalized transcript
    fn on_result(&self, result: TranscriptResult) {
        let _ = result;
    }

    /// An unstable partial transcript
    fn on_interim(&self, text: String) {
        let _ = text;
    }

    /// A fatal session error
    fn on_error(&self, error: CaptureError) {
        let _ = error;
    }

    /// Capture became active
    fn on_start(&self) {}

    /// Capture ended, by explicit stop or failure
    fn on_end(&self) {}
}

/// Fatal session errors surfaced to the consumer.
///
/// Soft conditions — a failed probe, a per-segment upload failure, benign
/// recognizer codes, a restartable end-of-stream — are absorbed internally
/// and never appear here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    /// Microphone or recognition service access was refused
    PermissionDenied,
    /// The recognition service is not permitted on this runtime
    ServiceNotAllowed,
    /// The capture device could not be acquired, or died mid-session
    MicrophoneUnavailable(String),
    /// The native engine could not be started or restarted
    RecognizerFailed(String),
    /// Neither backend was usable at initialize()
    NoMethodAvailable,
}

impl CaptureError {
    /// Stable machine-readable code for consumer-side handling
    pub fn code(&self) -> &'static str {
        match self {
            CaptureError::PermissionDenied => "permission-denied",
            CaptureError::ServiceNotAllowed => "service-not-allowed",
            CaptureError::MicrophoneUnavailable(_) => "microphone-unavailable",
            CaptureError::RecognizerFailed(_) => "recognizer-failed",
            CaptureError::NoMethodAvailable => "no-method-available",
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::PermissionDenied => write!(f, "microphone permission denied"),
            CaptureError::ServiceNotAllowed => write!(f, "recognition service not permitted"),
            CaptureError::MicrophoneUnavailable(detail) => {
                write!(f, "microphone unavailable: {detail}")
            }
            CaptureError::RecognizerFailed(detail) => {
                write!(f, "recognizer failed: {detail}")
            }
            CaptureError::NoMethodAvailable => {
                write!(f, "no speech recognition method available")
            }
        }
    }
}

impl std::error::Error for CaptureError {}
