// Probe the local transcription backend and report what a session would do.
//
// Usage: cargo run --example probe_check [-- <backend-url>]

use anyhow::Result;
use coach_capture::ProviderProbe;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let base_url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://localhost:5000".to_string());

    info!("Probing {base_url}");

    let probe = ProviderProbe::new(&base_url, Duration::from_secs(2));
    let report = probe.check().await;

    println!("available: {}", report.available);
    println!("latency:   {:?}", report.latency);
    println!("detail:    {}", report.detail);

    if report.available {
        println!("a session would use the local backend");
    } else {
        println!("a session would fall back to the native recognizer, if present");
    }

    Ok(())
}
