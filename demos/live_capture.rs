// Live capture demo: microphone → voice-activity segmentation → local
// transcription backend, printing transcripts as they arrive.
//
// Prerequisites:
// - The transcription backend running on http://localhost:5000
//   (otherwise initialize() fails: this demo installs no native recognizer)
//
// Usage: cargo run --example live_capture [-- <seconds>]

use anyhow::Result;
use coach_capture::{CaptureConfig, CaptureError, CaptureObserver, SpeechCapture, TranscriptResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

struct PrintObserver;

impl CaptureObserver for PrintObserver {
    fn on_result(&self, result: TranscriptResult) {
        let language = result.language.as_deref().unwrap_or("?");
        println!(
            "[{} lang={} conf={:.2}] {}",
            result.source, language, result.confidence, result.text
        );
    }

    fn on_interim(&self, text: String) {
        println!("(interim) {text}");
    }

    fn on_error(&self, error: CaptureError) {
        eprintln!("capture error: {error}");
    }

    fn on_start(&self) {
        println!("listening... speak, then pause to finalize a segment");
    }

    fn on_end(&self) {
        println!("capture ended");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let seconds: u64 = std::env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    let mut capture = SpeechCapture::new(CaptureConfig::default(), Arc::new(PrintObserver));

    let provider = capture.initialize().await?;
    info!("Provider: {provider}");

    capture.start().await?;
    tokio::time::sleep(Duration::from_secs(seconds)).await;
    capture.stop().await;

    Ok(())
}
