use anyhow::Result;
use clap::Parser;
use coach_capture::{
    CaptureConfig, CaptureError, CaptureObserver, Config, SpeechCapture, TapSource,
    TranscriptResult,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "coach-capture",
    about = "Live speech capture for the coaching dashboard"
)]
struct Cli {
    /// Config file name, as accepted by the config loader
    #[arg(long, default_value = "config/coach-capture")]
    config: String,

    /// Override the transcription backend URL
    #[arg(long)]
    backend_url: Option<String>,

    /// Capture from a WAV file instead of the microphone
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Stop after this many seconds (default: run until Ctrl+C)
    #[arg(long)]
    duration: Option<u64>,

    /// Emit interim text via the streaming endpoint
    #[arg(long)]
    stream_interim: bool,

    /// Print results as JSON lines instead of plain text
    #[arg(long)]
    json: bool,
}

/// Prints transcripts to stdout, standing in for the dashboard consumer.
struct ConsoleObserver {
    json: bool,
}

impl CaptureObserver for ConsoleObserver {
    fn on_result(&self, result: TranscriptResult) {
        if self.json {
            match serde_json::to_string(&result) {
                Ok(line) => println!("{line}"),
                Err(e) => eprintln!("failed to encode result: {e}"),
            }
        } else {
            println!("[{}] {}", result.source, result.text);
        }
    }

    fn on_interim(&self, text: String) {
        print!("\r... {text}");
        let _ = std::io::Write::flush(&mut std::io::stdout());
    }

    fn on_error(&self, error: CaptureError) {
        eprintln!("capture error ({}): {error}", error.code());
    }

    fn on_start(&self) {
        info!("Capture started");
    }

    fn on_end(&self) {
        info!("Capture ended");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let mut capture_config = match Config::load(&cli.config) {
        Ok(cfg) => {
            info!("Loaded config: {}", cfg.service.name);
            cfg.capture
        }
        Err(e) => {
            info!("No config file loaded ({e}); using defaults");
            CaptureConfig::default()
        }
    };

    if let Some(url) = cli.backend_url {
        capture_config.backend_url = url;
    }
    if cli.stream_interim {
        capture_config.stream_interim = true;
    }

    let observer = ConsoleObserver { json: cli.json };
    let mut capture = SpeechCapture::new(capture_config, Arc::new(observer));
    if let Some(path) = cli.wav {
        capture = capture.with_tap_source(TapSource::File(path));
    }

    let provider = capture.initialize().await?;
    info!("Selected provider: {provider}");

    capture.start().await?;

    match cli.duration {
        Some(secs) => tokio::time::sleep(std::time::Duration::from_secs(secs)).await,
        None => {
            tokio::signal::ctrl_c().await?;
            info!("Interrupted; stopping capture");
        }
    }

    capture.stop().await;

    Ok(())
}
