use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::native::{fatal_error, is_benign_code, ContinuousRecognizer, RecognizerEvent, StartError};
use super::{Provider, TranscriptResult};
use crate::session::{CaptureError, CaptureObserver, StateCell};
use crate::timer::Countdown;

/// Restart backoff for the native path
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Debounce before the first restart attempt, avoiding restart storms
    pub restart_delay_ms: u64,
    /// Delay before the single retry after a failed restart
    pub restart_retry_delay_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            restart_delay_ms: 100,
            restart_retry_delay_ms: 500,
        }
    }
}

/// Drives a continuous recognizer for the lifetime of one session.
///
/// Benign engine errors are absorbed; an unexpected end-of-stream while the
/// session is active earns a bounded restart (immediate attempt, then one
/// delayed retry) before the failure is surfaced. Fatal codes end the
/// session at once. The engine is stopped on every exit path.
pub struct RecognitionController {
    recognizer: Box<dyn ContinuousRecognizer>,
    events: mpsc::Receiver<RecognizerEvent>,
    observer: Arc<dyn CaptureObserver>,
    state: StateCell,
    config: ControllerConfig,
    shutdown: watch::Receiver<bool>,
    restart: Countdown,
    restart_attempt: u8,
    epoch: Instant,
}

impl RecognitionController {
    pub fn new(
        recognizer: Box<dyn ContinuousRecognizer>,
        events: mpsc::Receiver<RecognizerEvent>,
        observer: Arc<dyn CaptureObserver>,
        state: StateCell,
        config: ControllerConfig,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let restart = Countdown::new(config.restart_delay_ms);
        Self {
            recognizer,
            events,
            observer,
            state,
            config,
            shutdown,
            restart,
            restart_attempt: 0,
            epoch: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Run until the session stops or fails.
    pub async fn run(mut self) {
        debug!("Recognition controller started ({})", self.recognizer.name());

        loop {
            let pending = self.restart.remaining(self.now_ms());

            tokio::select! {
                biased;

                _ = self.shutdown.changed() => break,

                _ = tokio::time::sleep(pending.unwrap_or_default()), if pending.is_some() => {
                    self.restart.cancel();
                    if !self.attempt_restart().await {
                        break;
                    }
                }

                event = self.events.recv() => {
                    match event {
                        None => {
                            self.fail(CaptureError::RecognizerFailed(
                                "recognizer event stream closed".to_string(),
                            ));
                            break;
                        }
                        Some(event) => {
                            if !self.handle_event(event) {
                                break;
                            }
                        }
                    }
                }
            }
        }

        self.recognizer.stop().await;
        debug!("Recognition controller stopped");
    }

    /// Returns false when the controller should shut down.
    fn handle_event(&mut self, event: RecognizerEvent) -> bool {
        match event {
            RecognizerEvent::Started => {
                debug!("Recognizer listening");
                self.restart_attempt = 0;
                true
            }
            RecognizerEvent::Result {
                index,
                is_final,
                text,
                confidence,
            } => {
                if text.is_empty() || !self.state.is_active() {
                    return true;
                }

                if is_final {
                    debug!("Final result #{index}: \"{text}\"");
                    self.observer.on_result(TranscriptResult {
                        text,
                        source: Provider::Native,
                        language: None,
                        words: None,
                        confidence: confidence.unwrap_or(1.0),
                    });
                } else {
                    self.observer.on_interim(text);
                }
                true
            }
            RecognizerEvent::Error(code) => {
                if is_benign_code(&code) {
                    debug!("Ignoring benign recognizer error: {code}");
                    true
                } else if let Some(err) = fatal_error(&code) {
                    self.fail(err);
                    false
                } else {
                    warn!("Unclassified recognizer error: {code}");
                    true
                }
            }
            RecognizerEvent::Ended => {
                if !self.state.is_active() {
                    debug!("Recognizer ended after stop");
                    return false;
                }

                warn!("Recognizer ended unexpectedly; scheduling restart");
                self.restart_attempt = 1;
                self.restart
                    .arm_with(self.now_ms(), self.config.restart_delay_ms);
                true
            }
        }
    }

    /// Returns false when restart attempts are exhausted.
    async fn attempt_restart(&mut self) -> bool {
        match self.recognizer.start().await {
            Ok(()) => {
                info!("Recognizer restarted");
                self.restart_attempt = 0;
                true
            }
            Err(StartError::AlreadyRunning) => {
                debug!("Recognizer already running; restart treated as successful");
                self.restart_attempt = 0;
                true
            }
            Err(StartError::Failed(message)) => {
                if self.restart_attempt == 1 {
                    warn!(
                        "Restart failed ({message}); retrying in {}ms",
                        self.config.restart_retry_delay_ms
                    );
                    self.restart_attempt = 2;
                    self.restart
                        .arm_with(self.now_ms(), self.config.restart_retry_delay_ms);
                    true
                } else {
                    self.fail(CaptureError::RecognizerFailed(message));
                    false
                }
            }
        }
    }

    fn fail(&self, err: CaptureError) {
        if self.state.fail() {
            error!("Capture session failed: {err}");
            self.observer.on_error(err);
            self.observer.on_end();
        }
    }
}
