//! Speech-to-text through an OpenAI-compatible `/audio/transcriptions` endpoint.

use std::path::Path;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

/// Transcript returned when the provider answers without text.
pub const TRANSCRIPTION_FAILED: &str = "❌ Failed to transcribe";

/// Errors raised while transcribing audio.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    /// No API key was configured.
    #[error("OPENAI_API_KEY is not set")]
    MissingApiKey,
    /// The audio file could not be read.
    #[error("Failed to read audio file: {0}")]
    Io(#[from] std::io::Error),
    /// HTTP layer failed before receiving a response.
    #[error("Transcription request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider answered with a non-success status.
    #[error("Transcription API error (status {status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
}

/// Converts an audio file into text.
#[async_trait]
pub trait SpeechTranscriber: Send + Sync {
    /// Transcribe the WAV file at `audio`.
    async fn transcribe(&self, audio: &Path) -> Result<String, TranscriptionError>;
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Hosted speech-to-text client.
pub struct OpenAiTranscriber {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiTranscriber {
    /// Build a transcriber. Created once and shared for the process lifetime.
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, model: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/audio/transcriptions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl SpeechTranscriber for OpenAiTranscriber {
    async fn transcribe(&self, audio: &Path) -> Result<String, TranscriptionError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(TranscriptionError::MissingApiKey)?;
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio.wav".to_string());
        tracing::debug!(audio = %audio.display(), bytes = bytes.len(), model = %self.model, "Uploading audio for transcription");

        let part = Part::bytes(bytes).file_name(file_name).mime_str("audio/wav")?;
        let form = Form::new().text("model", self.model.clone()).part("file", part);

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TranscriptionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: TranscriptionResponse = response.json().await?;
        Ok(match payload.text {
            Some(text) => text,
            None => {
                tracing::warn!("Transcription response carried no text");
                TRANSCRIPTION_FAILED.to_string()
            }
        })
    }
}
