pub mod audio;
pub mod config;
pub mod provider;
pub mod session;
pub mod timer;

pub use audio::{
    rms_dbfs, AudioFrame, AudioSegment, AudioTap, AudioTapFactory, FileTap, MicrophoneTap,
    SegmenterConfig, TapConfig, TapSource, VoiceSegmenter,
};
pub use config::Config;
pub use provider::{
    ContinuousRecognizer, ControllerConfig, NativeRecognizerProvider, ProbeReport, Provider,
    ProviderDecision, ProviderProbe, RecognitionController, RecognizerConfig, RecognizerEvent,
    StartError, TranscriptResult, TranscriptionClient, WordTiming,
};
pub use session::{
    CaptureConfig, CaptureError, CaptureObserver, RecognitionSession, SessionState, SpeechCapture,
    StateCell,
};
pub use timer::Countdown;
