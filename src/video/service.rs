//! Video analysis pipeline: audio, transcript, emotion, behavior scan, then feedback.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::{BehaviorSettings, Config};
use crate::llm::{CompletionClient, LlmError};
use crate::video::emotion::{
    DisabledEmotionClassifier, EmotionClassifier, HttpEmotionClassifier, classify_or_unknown,
};
use crate::video::feedback::{FeedbackGenerator, FeedbackSections, VideoSignals};
use crate::video::media::{
    AudioExtractor, FfmpegAudioExtractor, FfmpegFrameDecoder, FrameDecoder, MediaError,
};
use crate::video::posture::{DisabledPoseEstimator, HttpPoseEstimator, PoseEstimator, scan_behavior};
use crate::video::transcribe::{OpenAiTranscriber, SpeechTranscriber, TranscriptionError};

/// Errors raised by the video pipeline.
#[derive(Debug, Error)]
pub enum VideoError {
    /// The extractor finished but no audio file was produced.
    #[error("No audio was extracted to {0}")]
    AudioMissing(PathBuf),
    /// Running or reading from `ffmpeg` failed.
    #[error(transparent)]
    Media(#[from] MediaError),
    /// Speech-to-text failed.
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
    /// Feedback generation failed.
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// Result of one video analysis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoReport {
    /// Measured signals.
    pub signals: VideoSignals,
    /// Rendered feedback.
    pub feedback: FeedbackSections,
}

/// Runs the video pipeline. Analyses are serialized because the audio path is shared.
pub struct VideoFeedbackService {
    audio: Arc<dyn AudioExtractor>,
    transcriber: Arc<dyn SpeechTranscriber>,
    decoder: Arc<dyn FrameDecoder>,
    emotion: Arc<dyn EmotionClassifier>,
    pose: Arc<dyn PoseEstimator>,
    feedback: FeedbackGenerator,
    settings: BehaviorSettings,
    running: Mutex<()>,
}

impl VideoFeedbackService {
    /// Assemble the pipeline from its stages.
    pub fn new(
        audio: Arc<dyn AudioExtractor>,
        transcriber: Arc<dyn SpeechTranscriber>,
        decoder: Arc<dyn FrameDecoder>,
        emotion: Arc<dyn EmotionClassifier>,
        pose: Arc<dyn PoseEstimator>,
        feedback: FeedbackGenerator,
        settings: BehaviorSettings,
    ) -> Self {
        Self {
            audio,
            transcriber,
            decoder,
            emotion,
            pose,
            feedback,
            settings,
            running: Mutex::new(()),
        }
    }

    /// Production pipeline: `ffmpeg`, hosted transcription, and the optional HTTP classifiers.
    pub fn from_config(config: &Config, llm: Arc<dyn CompletionClient>) -> Self {
        let emotion: Arc<dyn EmotionClassifier> = match &config.emotion_service_url {
            Some(url) => Arc::new(HttpEmotionClassifier::new(url.clone())),
            None => {
                tracing::info!("EMOTION_SERVICE_URL not set; emotion will be reported as Unknown");
                Arc::new(DisabledEmotionClassifier)
            }
        };
        let pose: Arc<dyn PoseEstimator> = match &config.pose_service_url {
            Some(url) => Arc::new(HttpPoseEstimator::new(url.clone())),
            None => {
                tracing::info!("POSE_SERVICE_URL not set; posture will not be scored");
                Arc::new(DisabledPoseEstimator)
            }
        };

        Self::new(
            Arc::new(FfmpegAudioExtractor::new(
                config.ffmpeg_bin.clone(),
                config.audio_output_path.clone(),
            )),
            Arc::new(OpenAiTranscriber::new(
                config.openai_base_url.clone(),
                config.openai_api_key.clone(),
                config.transcription_model.clone(),
            )),
            Arc::new(FfmpegFrameDecoder::new(
                config.ffmpeg_bin.clone(),
                config.ffprobe_bin.clone(),
            )),
            emotion,
            pose,
            FeedbackGenerator::new(llm, config.structured_output),
            config.behavior,
        )
    }

    /// Analyze the video at `video`.
    pub async fn analyze(&self, video: &Path) -> Result<VideoReport, VideoError> {
        let _running = self.running.lock().await;

        let audio = self.audio.extract(video).await?;
        if !tokio::fs::try_exists(&audio).await.unwrap_or(false) {
            return Err(VideoError::AudioMissing(audio));
        }
        let transcript = self.transcriber.transcribe(&audio).await;
        if let Err(error) = tokio::fs::remove_file(&audio).await {
            tracing::debug!(audio = %audio.display(), %error, "Could not remove audio file");
        }
        let transcript = transcript?;
        tracing::info!(chars = transcript.chars().count(), "Transcribed interview audio");

        let first_frame = match self.decoder.first_frame(video).await {
            Ok(frame) => frame,
            Err(error) => {
                tracing::warn!(%error, "Could not decode first frame");
                None
            }
        };
        let emotion = classify_or_unknown(self.emotion.as_ref(), first_frame.as_ref()).await;

        let tally = scan_behavior(
            self.decoder.as_ref(),
            self.pose.as_ref(),
            video,
            &self.settings,
        )
        .await;
        let scores = tally.scores();
        tracing::info!(
            %emotion,
            frames = tally.frames,
            posture_score = scores.posture_score,
            blink_rate = scores.blink_rate,
            "Measured behavioral signals"
        );

        let signals = VideoSignals {
            emotion,
            posture_score: scores.posture_score,
            blink_rate: scores.blink_rate,
            transcript,
        };
        let feedback = self.feedback.generate(&signals, &self.settings).await?;
        Ok(VideoReport { signals, feedback })
    }
}
