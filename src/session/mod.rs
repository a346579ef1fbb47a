//! Capture session management
//!
//! This module provides the `SpeechCapture` facade that manages:
//! - Backend selection (one probe, one provider per session)
//! - The segmentation + upload pipeline on the local path
//! - The continuous-recognition controller on the native path
//! - Session state transitions and resource teardown
//! - The consumer callback surface

mod config;
mod observer;
mod session;
mod state;

pub use config::CaptureConfig;
pub use observer::{CaptureError, CaptureObserver};
pub use session::{RecognitionSession, SpeechCapture};
pub use state::{SessionState, StateCell};
