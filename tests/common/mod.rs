// Shared test support: a canned-response HTTP backend, scripted audio taps,
// a scripted continuous recognizer, and an observer that records callbacks.

#![allow(dead_code)]

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use coach_capture::{
    AudioFrame, AudioTap, CaptureError, CaptureObserver, ContinuousRecognizer,
    NativeRecognizerProvider, Provider, RecognizerConfig, RecognizerEvent, StartError,
    TranscriptResult,
};

// ============================================================================
// Canned-response HTTP backend
// ============================================================================

#[derive(Clone)]
pub struct BackendBehavior {
    pub health_status: u16,
    pub health_body: String,
    pub health_delay: Duration,
    pub transcribe_status: u16,
    /// `{n}` is replaced with the 1-based request number
    pub transcribe_body: String,
    pub transcribe_delay: Duration,
    pub stream_status: u16,
    pub stream_body: String,
    pub stream_delay: Duration,
}

impl Default for BackendBehavior {
    fn default() -> Self {
        Self {
            health_status: 200,
            health_body: r#"{"status":"healthy","model_loaded":true,"device":"cpu"}"#.to_string(),
            health_delay: Duration::ZERO,
            transcribe_status: 200,
            transcribe_body: r#"{"success":true,"text":"hello world"}"#.to_string(),
            transcribe_delay: Duration::ZERO,
            stream_status: 200,
            stream_body: r#"{"success":true,"text":"hel"}"#.to_string(),
            stream_delay: Duration::ZERO,
        }
    }
}

pub struct FakeBackend {
    pub addr: SocketAddr,
    pub health_hits: Arc<AtomicUsize>,
    pub transcribe_hits: Arc<AtomicUsize>,
    pub stream_hits: Arc<AtomicUsize>,
    server: JoinHandle<()>,
}

impl FakeBackend {
    pub async fn spawn(behavior: BackendBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let health_hits = Arc::new(AtomicUsize::new(0));
        let transcribe_hits = Arc::new(AtomicUsize::new(0));
        let stream_hits = Arc::new(AtomicUsize::new(0));

        let hh = Arc::clone(&health_hits);
        let th = Arc::clone(&transcribe_hits);
        let sh = Arc::clone(&stream_hits);

        let server = tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    break;
                };
                let behavior = behavior.clone();
                let hh = Arc::clone(&hh);
                let th = Arc::clone(&th);
                let sh = Arc::clone(&sh);
                tokio::spawn(async move {
                    serve_connection(socket, behavior, hh, th, sh).await;
                });
            }
        });

        Self {
            addr,
            health_hits,
            transcribe_hits,
            stream_hits,
            server,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn serve_connection(
    mut socket: tokio::net::TcpStream,
    behavior: BackendBehavior,
    health_hits: Arc<AtomicUsize>,
    transcribe_hits: Arc<AtomicUsize>,
    stream_hits: Arc<AtomicUsize>,
) {
    let mut buf = Vec::new();
    let mut tmp = [0u8; 4096];

    let header_end = loop {
        let n = match socket.read(&mut tmp).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&tmp[..n]);
        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        if buf.len() > 10_000_000 {
            return;
        }
    };

    let headers = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = headers
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = match socket.read(&mut tmp).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => return,
        };
        buf.extend_from_slice(&tmp[..n]);
    }

    let request_line = headers.lines().next().unwrap_or_default();

    let (status, body, delay) = if request_line.contains("/transcribe-stream") {
        stream_hits.fetch_add(1, Ordering::SeqCst);
        (
            behavior.stream_status,
            behavior.stream_body.clone(),
            behavior.stream_delay,
        )
    } else if request_line.contains("/transcribe") {
        let n = transcribe_hits.fetch_add(1, Ordering::SeqCst) + 1;
        (
            behavior.transcribe_status,
            behavior.transcribe_body.replace("{n}", &n.to_string()),
            behavior.transcribe_delay,
        )
    } else {
        health_hits.fetch_add(1, Ordering::SeqCst);
        (
            behavior.health_status,
            behavior.health_body.clone(),
            behavior.health_delay,
        )
    };

    tokio::time::sleep(delay).await;

    let reason = match status {
        200 => "OK",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Error",
    };
    let response = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

// ============================================================================
// Recording observer
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ObservedEvent {
    Started,
    Ended,
    Interim(String),
    Result(String, Provider),
    /// Holds the error's stable code
    Error(String),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ObservedEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<ObservedEvent> {
        self.events.lock().expect("observer lock").clone()
    }

    pub fn results(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ObservedEvent::Result(text, _) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn interims(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ObservedEvent::Interim(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ObservedEvent::Error(code) => Some(code),
                _ => None,
            })
            .collect()
    }

    pub fn ended_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == ObservedEvent::Ended)
            .count()
    }

    fn push(&self, event: ObservedEvent) {
        self.events.lock().expect("observer lock").push(event);
    }
}

impl CaptureObserver for RecordingObserver {
    fn on_result(&self, result: TranscriptResult) {
        self.push(ObservedEvent::Result(result.text, result.source));
    }

    fn on_interim(&self, text: String) {
        self.push(ObservedEvent::Interim(text));
    }

    fn on_error(&self, error: CaptureError) {
        self.push(ObservedEvent::Error(error.code().to_string()));
    }

    fn on_start(&self) {
        self.push(ObservedEvent::Started);
    }

    fn on_end(&self) {
        self.push(ObservedEvent::Ended);
    }
}

// ============================================================================
// Frame builders
// ============================================================================

pub const TEST_RATE: u32 = 16000;

/// A frame loud enough to clear any reasonable energy threshold.
pub fn voiced_frame(timestamp_ms: u64, frame_ms: u64) -> AudioFrame {
    let count = (TEST_RATE as u64 * frame_ms / 1000) as usize;
    AudioFrame {
        samples: vec![8000i16; count],
        sample_rate: TEST_RATE,
        channels: 1,
        timestamp_ms,
    }
}

/// A digitally silent frame.
pub fn silent_frame(timestamp_ms: u64, frame_ms: u64) -> AudioFrame {
    let count = (TEST_RATE as u64 * frame_ms / 1000) as usize;
    AudioFrame {
        samples: vec![0i16; count],
        sample_rate: TEST_RATE,
        channels: 1,
        timestamp_ms,
    }
}

// ============================================================================
// Scripted audio taps
// ============================================================================

/// Replays a fixed frame list, optionally paced, then holds the channel open
/// until the session stops.
pub struct ScriptedTap {
    frames: Vec<AudioFrame>,
    pace: Option<Duration>,
    shutdown: Option<watch::Sender<bool>>,
    worker: Option<JoinHandle<()>>,
}

impl ScriptedTap {
    pub fn new(frames: Vec<AudioFrame>, pace: Option<Duration>) -> Self {
        Self {
            frames,
            pace,
            shutdown: None,
            worker: None,
        }
    }
}

#[async_trait::async_trait]
impl AudioTap for ScriptedTap {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        let frames = std::mem::take(&mut self.frames);
        let pace = self.pace;
        let (tx, rx) = mpsc::channel(256);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        let worker = tokio::spawn(async move {
            for frame in frames {
                if let Some(pace) = pace {
                    tokio::time::sleep(pace).await;
                }
                tokio::select! {
                    _ = shutdown_rx.changed() => return,
                    sent = tx.send(frame) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            let _ = shutdown_rx.changed().await;
        });

        self.shutdown = Some(shutdown_tx);
        self.worker = Some(worker);
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(true);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.await;
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.worker.is_some()
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// A tap whose acquisition always fails, standing in for a refused device.
pub struct FailingTap;

#[async_trait::async_trait]
impl AudioTap for FailingTap {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        Err(anyhow!("microphone access refused"))
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        false
    }

    fn name(&self) -> &str {
        "failing"
    }
}

// ============================================================================
// Scripted continuous recognizer
// ============================================================================

pub struct ScriptedRecognizer {
    start_results: Arc<Mutex<VecDeque<std::result::Result<(), StartError>>>>,
    starts: Arc<AtomicUsize>,
    stopped: Arc<AtomicBool>,
}

#[async_trait::async_trait]
impl ContinuousRecognizer for ScriptedRecognizer {
    async fn start(&mut self) -> std::result::Result<(), StartError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.start_results
            .lock()
            .expect("start results lock")
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Builds scripted recognizers and keeps handles the test can poke.
pub struct ScriptedNativeProvider {
    pub available: bool,
    /// Sender for the most recently created recognizer's event channel
    pub event_tx: Arc<Mutex<Option<mpsc::Sender<RecognizerEvent>>>>,
    /// Outcomes handed to successive `start()` calls (then Ok forever)
    pub start_results: Arc<Mutex<VecDeque<std::result::Result<(), StartError>>>>,
    pub starts: Arc<AtomicUsize>,
    pub stopped: Arc<AtomicBool>,
}

impl ScriptedNativeProvider {
    pub fn new(available: bool) -> Self {
        Self {
            available,
            event_tx: Arc::new(Mutex::new(None)),
            start_results: Arc::new(Mutex::new(VecDeque::new())),
            starts: Arc::new(AtomicUsize::new(0)),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn push_start_result(&self, result: std::result::Result<(), StartError>) {
        self.start_results
            .lock()
            .expect("start results lock")
            .push_back(result);
    }

    pub fn event_sender(&self) -> mpsc::Sender<RecognizerEvent> {
        self.event_tx
            .lock()
            .expect("event tx lock")
            .clone()
            .expect("recognizer not created yet")
    }

    /// Build a recognizer/event-channel pair without going through the
    /// provider trait (for driving the controller directly).
    pub fn build(&self) -> (Box<dyn ContinuousRecognizer>, mpsc::Receiver<RecognizerEvent>) {
        let (tx, rx) = mpsc::channel(32);
        *self.event_tx.lock().expect("event tx lock") = Some(tx);
        let recognizer = ScriptedRecognizer {
            start_results: Arc::clone(&self.start_results),
            starts: Arc::clone(&self.starts),
            stopped: Arc::clone(&self.stopped),
        };
        (Box::new(recognizer), rx)
    }
}

impl NativeRecognizerProvider for ScriptedNativeProvider {
    fn is_available(&self) -> bool {
        self.available
    }

    fn create(
        &self,
        _config: &RecognizerConfig,
    ) -> Result<(Box<dyn ContinuousRecognizer>, mpsc::Receiver<RecognizerEvent>)> {
        Ok(self.build())
    }
}
