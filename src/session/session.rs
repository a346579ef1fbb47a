use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::config::CaptureConfig;
use super::observer::{CaptureError, CaptureObserver};
use super::state::{SessionState, StateCell};
use crate::audio::{
    AudioFrame, AudioSegment, AudioTap, AudioTapFactory, TapSource, VoiceSegmenter,
};
use crate::provider::{
    NativeRecognizerProvider, Provider, ProviderDecision, ProviderProbe, RecognitionController,
    StartError, TranscriptionClient,
};
use crate::timer::Countdown;

/// One capture session's identity and locked-in backend choice
#[derive(Debug, Clone)]
pub struct RecognitionSession {
    /// Unique session identifier
    pub id: String,

    /// Which backend this session uses; never changes mid-session
    pub decision: ProviderDecision,

    /// When the session was created
    pub started_at: DateTime<Utc>,
}

/// Uniform start/stop/callback surface over both speech-to-text backends.
///
/// `initialize()` probes the local backend once and locks in a provider for
/// the session. `start()` wires either the segmentation+upload pipeline or
/// the continuous-recognition controller; `stop()` tears either down,
/// cancelling pending timers and abandoning any upload still in flight.
/// Both calls are idempotent. Exactly one capture session is active at a
/// time; a stopped facade may be re-initialized for a fresh session.
pub struct SpeechCapture {
    config: CaptureConfig,
    observer: Arc<dyn CaptureObserver>,
    state: StateCell,
    session: Option<RecognitionSession>,
    tap_source: TapSource,
    tap_override: Option<Box<dyn AudioTap>>,
    native: Option<Box<dyn NativeRecognizerProvider>>,
    shutdown: Option<watch::Sender<bool>>,
    worker: Option<JoinHandle<()>>,
}

impl SpeechCapture {
    pub fn new(config: CaptureConfig, observer: Arc<dyn CaptureObserver>) -> Self {
        Self {
            config,
            observer,
            state: StateCell::new(),
            session: None,
            tap_source: TapSource::Microphone,
            tap_override: None,
            native: None,
            shutdown: None,
            worker: None,
        }
    }

    /// Supply the runtime's continuous recognizer capability, if present.
    pub fn with_native_recognizer(mut self, provider: Box<dyn NativeRecognizerProvider>) -> Self {
        self.native = Some(provider);
        self
    }

    /// Capture from a source other than the default microphone.
    pub fn with_tap_source(mut self, source: TapSource) -> Self {
        self.tap_source = source;
        self
    }

    /// Inject a prepared audio tap. The tap is consumed by the next
    /// `start()` on the local path.
    pub fn with_audio_tap(mut self, tap: Box<dyn AudioTap>) -> Self {
        self.tap_override = Some(tap);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn session(&self) -> Option<&RecognitionSession> {
        self.session.as_ref()
    }

    pub fn provider(&self) -> Option<Provider> {
        self.session.as_ref().map(|s| s.decision.provider)
    }

    /// Probe for the best available backend and lock it in for this session.
    ///
    /// Each call runs an independent, fresh probe. When neither backend is
    /// usable the session becomes UNAVAILABLE and the error carries
    /// [`CaptureError::NoMethodAvailable`]; that condition is surfaced here,
    /// not through the observer.
    pub async fn initialize(&mut self) -> Result<Provider> {
        let current = self.state.get();
        if current == SessionState::Active {
            bail!("capture session already active; stop it before re-initializing");
        }
        if !self.state.begin_probing() {
            bail!("capture session is {current} and cannot be initialized");
        }

        info!("Initializing speech capture");

        let probe = ProviderProbe::new(&self.config.backend_url, self.config.probe_timeout());
        let report = probe.check().await;

        let decision = if report.available {
            info!("Using local transcription backend ({})", report.detail);
            ProviderDecision {
                provider: Provider::Local,
                probe_latency: report.latency,
                reason: report.detail,
            }
        } else if self.native.as_ref().is_some_and(|n| n.is_available()) {
            info!(
                "Local backend unavailable ({}); using native recognizer",
                report.detail
            );
            ProviderDecision {
                provider: Provider::Native,
                probe_latency: report.latency,
                reason: format!("local backend unavailable: {}", report.detail),
            }
        } else {
            self.state.mark_unavailable();
            error!("No speech recognition method available");
            return Err(anyhow::Error::new(CaptureError::NoMethodAvailable));
        };

        let provider = decision.provider;
        self.state.mark_ready(provider);

        let session = RecognitionSession {
            id: format!("capture-{}", uuid::Uuid::new_v4()),
            decision,
            started_at: Utc::now(),
        };
        info!("Session {} ready (provider={})", session.id, provider);
        self.session = Some(session);

        Ok(provider)
    }

    /// Begin capturing. A no-op (with a warning) while already active.
    pub async fn start(&mut self) -> Result<()> {
        if self.state.is_active() {
            warn!("Capture already active");
            return Ok(());
        }

        let provider = match self.session.as_ref() {
            Some(session) if self.state.get().is_ready() => session.decision.provider,
            _ => bail!("capture session is not initialized"),
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let worker = match provider {
            Provider::Local => self.start_local(shutdown_rx).await?,
            Provider::Native => self.start_native(shutdown_rx).await?,
        };

        self.shutdown = Some(shutdown_tx);
        self.worker = Some(worker);
        self.state.activate();

        info!("Capture session active (provider={provider})");
        self.observer.on_start();

        Ok(())
    }

    /// Stop capturing and release the audio resources. A no-op while not
    /// active. Any transcription request still in flight is abandoned; its
    /// result is never delivered.
    pub async fn stop(&mut self) {
        let was_active = self.state.finish();

        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }

        let Some(worker) = self.worker.take() else {
            debug!("stop() called while not active");
            return;
        };

        if let Err(e) = worker.await {
            error!("Capture worker panicked: {e}");
        }

        if was_active {
            info!("Capture session stopped");
            self.observer.on_end();
        }
    }

    async fn start_local(
        &mut self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>> {
        let mut tap = match self.tap_override.take() {
            Some(tap) => tap,
            None => AudioTapFactory::create(self.tap_source.clone(), self.config.tap_config())?,
        };

        debug!("Acquiring audio tap ({})", tap.name());
        let frames = match tap.start().await {
            Ok(frames) => frames,
            Err(e) => {
                let err = CaptureError::MicrophoneUnavailable(format!("{e:#}"));
                if self.state.fail() {
                    error!("Capture session failed: {err}");
                    self.observer.on_error(err.clone());
                }
                return Err(anyhow::Error::new(err));
            }
        };

        let pipeline = LocalPipeline {
            tap,
            frames,
            segmenter: VoiceSegmenter::new(self.config.segmenter_config()),
            client: TranscriptionClient::new(
                &self.config.backend_url,
                self.config.request_timeout(),
                self.config.stream_timeout(),
            ),
            observer: Arc::clone(&self.observer),
            state: self.state.clone(),
            shutdown,
            stream_interim: self.config.stream_interim,
            interim: Countdown::new(self.config.interim_interval_ms),
        };

        Ok(tokio::spawn(pipeline.run()))
    }

    async fn start_native(
        &mut self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<JoinHandle<()>> {
        let provider = match self.native.as_ref() {
            Some(provider) => provider,
            None => bail!("native recognizer capability is not present"),
        };

        let (mut recognizer, events) = provider.create(&self.config.recognizer_config())?;

        debug!("Starting native recognizer ({})", recognizer.name());
        match recognizer.start().await {
            Ok(()) => {}
            Err(StartError::AlreadyRunning) => {
                debug!("Recognizer already running");
            }
            Err(StartError::Failed(message)) => {
                let err = CaptureError::RecognizerFailed(message);
                if self.state.fail() {
                    error!("Capture session failed: {err}");
                    self.observer.on_error(err.clone());
                }
                return Err(anyhow::Error::new(err));
            }
        }

        let controller = RecognitionController::new(
            recognizer,
            events,
            Arc::clone(&self.observer),
            self.state.clone(),
            self.config.controller_config(),
            shutdown,
        );

        Ok(tokio::spawn(controller.run()))
    }
}

/// The local-backend capture loop: audio tap → segmenter → upload.
///
/// Everything runs in one task, which is what serializes uploads and keeps
/// results in segment order. Capture pauses during an upload; the frame
/// backlog is discarded afterwards so the next segment starts from live
/// audio.
struct LocalPipeline {
    tap: Box<dyn AudioTap>,
    frames: mpsc::Receiver<AudioFrame>,
    segmenter: VoiceSegmenter,
    client: TranscriptionClient,
    observer: Arc<dyn CaptureObserver>,
    state: StateCell,
    shutdown: watch::Receiver<bool>,
    stream_interim: bool,
    interim: Countdown,
}

impl LocalPipeline {
    async fn run(mut self) {
        debug!("Local capture pipeline started");

        let failure = self.capture_loop().await;

        if let Err(e) = self.tap.stop().await {
            warn!("Failed to stop audio tap: {e:#}");
        }

        if let Some(err) = failure {
            if self.state.fail() {
                error!("Capture session failed: {err}");
                self.observer.on_error(err);
                self.observer.on_end();
            }
        }

        debug!("Local capture pipeline stopped");
    }

    /// Returns a fatal error when the pipeline died, None on clean shutdown.
    async fn capture_loop(&mut self) -> Option<CaptureError> {
        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.changed() => return None,

                frame = self.frames.recv() => {
                    let Some(frame) = frame else {
                        return Some(CaptureError::MicrophoneUnavailable(
                            "audio stream ended unexpectedly".to_string(),
                        ));
                    };

                    let now = frame.timestamp_ms;

                    if let Some(segment) = self.segmenter.advance(&frame) {
                        self.interim.cancel();
                        if !self.process_segment(segment).await {
                            return None;
                        }
                    } else if self.stream_interim {
                        if self.interim.expired(now) {
                            self.interim.cancel();
                            if !self.stream_open_segment().await {
                                return None;
                            }
                        } else if !self.interim.is_armed()
                            && self.segmenter.open_voiced_samples().is_some()
                        {
                            self.interim.arm(now);
                        }
                    }
                }
            }
        }
    }

    /// Upload one finalized segment. Returns false when shutdown interrupted
    /// the upload; the result is discarded, never delivered.
    async fn process_segment(&mut self, segment: AudioSegment) -> bool {
        debug!(
            "Segment finalized [{}ms..{}ms] ({} samples)",
            segment.start_ms,
            segment.end_ms,
            segment.samples.len()
        );

        let outcome = tokio::select! {
            biased;

            _ = self.shutdown.changed() => return false,

            outcome = self.client.transcribe(segment) => outcome,
        };

        match outcome {
            Ok(result) => {
                if self.state.is_active() {
                    self.observer.on_result(result);
                }
            }
            Err(e) => {
                // Segment-scoped failure; capture resumes with the next one.
                warn!("Transcription failed; dropping segment: {e:#}");
            }
        }

        let mut flushed = 0usize;
        while self.frames.try_recv().is_ok() {
            flushed += 1;
        }
        if flushed > 0 {
            debug!("Flushed {flushed} stale frames after upload");
        }
        self.segmenter.reset();

        true
    }

    /// Send the open segment's audio to the streaming endpoint for interim
    /// display. Failures are soft; they never affect the session.
    async fn stream_open_segment(&mut self) -> bool {
        let snapshot = match self.segmenter.open_voiced_samples() {
            Some((samples, sample_rate)) => (samples.to_vec(), sample_rate),
            None => return true,
        };

        let outcome = tokio::select! {
            biased;

            _ = self.shutdown.changed() => return false,

            outcome = self.client.transcribe_stream(&snapshot.0, snapshot.1) => outcome,
        };

        match outcome {
            Ok(Some(text)) => {
                if self.state.is_active() {
                    self.observer.on_interim(text);
                }
            }
            Ok(None) => {}
            Err(e) => debug!("Interim stream request failed: {e:#}"),
        }

        true
    }
}
