use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Outcome of one readiness check
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub available: bool,
    pub latency: Duration,
    /// Human-readable detail for logs and the decision reason
    pub detail: String,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    model_loaded: bool,
    device: Option<String>,
    gpu_name: Option<String>,
}

/// Bounded-time readiness check of the local transcription backend.
///
/// A reachable backend only counts as available once its model has finished
/// loading. Every failure mode — unreachable, timeout, non-2xx, malformed
/// body — resolves to "unavailable" so the caller can fall back; the probe
/// itself never returns an error. Stateless and re-runnable.
pub struct ProviderProbe {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ProviderProbe {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
        }
    }

    /// Probe the backend once.
    pub async fn check(&self) -> ProbeReport {
        let url = format!("{}/health", self.base_url);
        debug!("Probing transcription backend at {}", url);

        let started = Instant::now();
        let outcome = self.http.get(&url).timeout(self.timeout).send().await;
        let latency = started.elapsed();

        let report = match outcome {
            Err(e) if e.is_timeout() => ProbeReport {
                available: false,
                latency,
                detail: format!("health check timed out after {:?}", self.timeout),
            },
            Err(e) => ProbeReport {
                available: false,
                latency,
                detail: format!("backend unreachable: {e}"),
            },
            Ok(response) if !response.status().is_success() => ProbeReport {
                available: false,
                latency,
                detail: format!("health check returned {}", response.status()),
            },
            Ok(response) => match response.json::<HealthResponse>().await {
                Err(e) => ProbeReport {
                    available: false,
                    latency,
                    detail: format!("malformed health response: {e}"),
                },
                Ok(health) => {
                    let available = health.status == "healthy" && health.model_loaded;
                    let detail = if available {
                        let device = health.device.unwrap_or_else(|| "cpu".to_string());
                        match health.gpu_name {
                            Some(gpu) => format!("backend healthy on {device} ({gpu})"),
                            None => format!("backend healthy on {device}"),
                        }
                    } else {
                        "backend reachable but not ready".to_string()
                    };
                    ProbeReport {
                        available,
                        latency,
                        detail,
                    }
                }
            },
        };

        if report.available {
            info!("Probe succeeded in {:?}: {}", report.latency, report.detail);
        } else {
            info!("Probe failed in {:?}: {}", report.latency, report.detail);
        }

        report
    }

    /// Convenience form of [`check`](Self::check) for callers that only need
    /// the verdict.
    pub async fn check_availability(&self) -> bool {
        self.check().await.available
    }
}
