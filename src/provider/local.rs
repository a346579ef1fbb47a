use anyhow::{bail, Context, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;
use tracing::{debug, info};

use super::{Provider, TranscriptResult, WordTiming};
use crate::audio::AudioSegment;

// The backend does not score whole utterances; its accuracy is assumed high.
const LOCAL_CONFIDENCE: f32 = 0.95;

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    success: bool,
    #[serde(default)]
    text: String,
    language: Option<String>,
    words: Option<Vec<WordTimingWire>>,
}

#[derive(Debug, Deserialize)]
struct WordTimingWire {
    word: String,
    start: f64,
    end: f64,
    #[serde(default = "default_word_confidence")]
    confidence: f32,
}

fn default_word_confidence() -> f32 {
    1.0
}

impl From<WordTimingWire> for WordTiming {
    fn from(wire: WordTimingWire) -> Self {
        Self {
            word: wire.word,
            start: wire.start,
            end: wire.end,
            confidence: wire.confidence,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamResponse {
    success: bool,
    #[serde(default)]
    text: String,
}

/// Client for the local transcription backend.
///
/// Uploads one finalized segment at a time; callers serialize requests. A
/// failed or timed-out upload is segment-scoped — the caller drops that
/// segment and keeps capturing.
pub struct TranscriptionClient {
    http: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    stream_timeout: Duration,
}

impl TranscriptionClient {
    pub fn new(
        base_url: impl Into<String>,
        request_timeout: Duration,
        stream_timeout: Duration,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            request_timeout,
            stream_timeout,
        }
    }

    /// Upload a finalized segment and return its transcript.
    pub async fn transcribe(&self, segment: AudioSegment) -> Result<TranscriptResult> {
        let duration_ms = segment.duration_ms();
        let wav = segment_to_wav_bytes(&segment)?;

        debug!(
            "Uploading segment [{}ms..{}ms] ({} bytes)",
            segment.start_ms,
            segment.end_ms,
            wav.len()
        );

        let part = Part::bytes(wav)
            .file_name("segment.wav")
            .mime_str("audio/wav")
            .context("failed to build multipart audio part")?;
        let form = Form::new().part("audio", part);

        let response = self
            .http
            .post(format!("{}/transcribe", self.base_url))
            .multipart(form)
            .timeout(self.request_timeout)
            .send()
            .await
            .context("transcription request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("transcription request returned {status}");
        }

        let body: TranscribeResponse = response
            .json()
            .await
            .context("failed to parse transcription response")?;

        if !body.success {
            bail!("backend reported transcription failure");
        }

        let text = body.text.trim().to_string();
        if text.is_empty() {
            bail!("backend returned an empty transcript");
        }

        info!("Transcribed {}ms of audio: \"{}\"", duration_ms, text);

        Ok(TranscriptResult {
            text,
            source: Provider::Local,
            language: body.language,
            words: body
                .words
                .map(|words| words.into_iter().map(Into::into).collect()),
            confidence: LOCAL_CONFIDENCE,
        })
    }

    /// Transcribe a snapshot of an open segment for interim display. Returns
    /// `None` when the backend produced no usable text.
    pub async fn transcribe_stream(
        &self,
        samples: &[i16],
        sample_rate: u32,
    ) -> Result<Option<String>> {
        let wav = samples_to_wav_bytes(samples, sample_rate)?;

        let response = self
            .http
            .post(format!("{}/transcribe-stream", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(wav)
            .timeout(self.stream_timeout)
            .send()
            .await
            .context("stream transcription request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("stream transcription request returned {status}");
        }

        let body: StreamResponse = response
            .json()
            .await
            .context("failed to parse stream transcription response")?;

        if !body.success {
            return Ok(None);
        }

        let text = body.text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}

fn samples_to_wav_bytes(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    let mut writer =
        hound::WavWriter::new(&mut cursor, spec).context("failed to initialize WAV writer")?;

    for &sample in samples {
        writer
            .write_sample(sample)
            .context("failed to write WAV sample")?;
    }

    writer.finalize().context("failed to finalize WAV data")?;

    Ok(cursor.into_inner())
}

fn segment_to_wav_bytes(segment: &AudioSegment) -> Result<Vec<u8>> {
    samples_to_wav_bytes(&segment.samples, segment.sample_rate)
}
