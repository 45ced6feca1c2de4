//! Dominant facial expression for a single frame.

use async_trait::async_trait;
use image::RgbImage;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::video::media::encode_png_base64;

/// Label used whenever classification is unavailable or fails.
pub const UNKNOWN_EMOTION: &str = "Unknown";

/// Labels the classifier is expected to produce.
pub const KNOWN_EMOTIONS: [&str; 7] = [
    "angry", "disgust", "fear", "happy", "sad", "surprise", "neutral",
];

/// Errors raised by emotion classifiers.
#[derive(Debug, Error)]
pub enum EmotionError {
    /// No classifier endpoint is configured.
    #[error("emotion classifier is disabled")]
    Disabled,
    /// The frame could not be encoded for upload.
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] image::ImageError),
    /// HTTP layer failed before receiving a response.
    #[error("Emotion request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Classifier answered with a non-success status.
    #[error("Emotion service error (status {status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
    /// The classifier returned no usable label.
    #[error("emotion service returned no label")]
    MissingLabel,
}

/// Classifies the dominant facial expression in a frame.
#[async_trait]
pub trait EmotionClassifier: Send + Sync {
    /// Return the dominant emotion label.
    async fn dominant_emotion(&self, frame: &RgbImage) -> Result<String, EmotionError>;
}

/// Classifier used when no endpoint is configured; always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledEmotionClassifier;

#[async_trait]
impl EmotionClassifier for DisabledEmotionClassifier {
    async fn dominant_emotion(&self, _frame: &RgbImage) -> Result<String, EmotionError> {
        Err(EmotionError::Disabled)
    }
}

#[derive(Deserialize)]
struct EmotionResponse {
    #[serde(default)]
    dominant_emotion: Option<String>,
}

/// Posts base64 PNG frames to an external face-analysis service.
pub struct HttpEmotionClassifier {
    http: Client,
    url: String,
}

impl HttpEmotionClassifier {
    /// Classifier posting to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl EmotionClassifier for HttpEmotionClassifier {
    async fn dominant_emotion(&self, frame: &RgbImage) -> Result<String, EmotionError> {
        let image = encode_png_base64(frame)?;
        let response = self
            .http
            .post(&self.url)
            .json(&json!({ "image": image }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmotionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: EmotionResponse = response.json().await?;
        payload
            .dominant_emotion
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty())
            .ok_or(EmotionError::MissingLabel)
    }
}

/// Classify `frame`, degrading to [`UNKNOWN_EMOTION`] on any failure or a missing frame.
pub async fn classify_or_unknown(
    classifier: &dyn EmotionClassifier,
    frame: Option<&RgbImage>,
) -> String {
    let Some(frame) = frame else {
        tracing::warn!("No frame available for emotion analysis");
        return UNKNOWN_EMOTION.to_string();
    };

    match classifier.dominant_emotion(frame).await {
        Ok(label) => {
            if !KNOWN_EMOTIONS.contains(&label.as_str()) {
                tracing::debug!(%label, "Emotion label outside the usual set");
            }
            label
        }
        Err(error) => {
            tracing::warn!(%error, "Emotion analysis failed");
            UNKNOWN_EMOTION.to_string()
        }
    }
}
