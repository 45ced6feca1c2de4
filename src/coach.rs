//! The three user actions (parse a CV, ask a question, analyze a video) and the boundary that
//! turns pipeline errors into user-facing messages.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::Config;
use crate::embedding::get_embedding_client;
use crate::ingest::{CvLoader, IngestError, PdfCvLoader};
use crate::interview::{
    AnswerEngine, AnswerError, QdrantRetriever, QuestionGenerationError, QuestionGenerator,
    render_answers,
};
use crate::llm::{CompletionClient, OpenAiChatClient};
use crate::metrics::{CoachMetrics, MetricsSnapshot};
use crate::qdrant::{QdrantError, QdrantService};
use crate::session::{CvSession, ParsedCv};
use crate::video::{VideoError, VideoFeedbackService, VideoSignals};

/// Shown when no PDF was supplied.
pub const INVALID_CV_MESSAGE: &str = "❌ Invalid file. Please upload a PDF.";
/// Shown when the question reply had no recognizable sections.
pub const QUESTION_FORMAT_MESSAGE: &str = "⚠️ Failed to parse questions properly.";
/// Shown when a custom question arrives before any CV was parsed.
pub const NO_CV_MESSAGE: &str = "⚠️ Please upload and parse a CV first.";
/// Shown when no video was supplied.
pub const NO_VIDEO_MESSAGE: &str = "❌ No video uploaded";
/// Shown when `ffmpeg` produced no audio.
pub const AUDIO_FAILED_MESSAGE: &str = "❌ Failed to extract audio";
/// Placeholder for feedback fields of a failed video analysis.
pub const FAILED_FIELD: &str = "❌";

/// Errors raised by the CV pipelines before they are rendered for the user.
#[derive(Debug, Error)]
pub enum CoachError {
    /// Loading or chunking the CV failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),
    /// Question generation failed.
    #[error(transparent)]
    Questions(#[from] QuestionGenerationError),
    /// Answering failed.
    #[error(transparent)]
    Answers(#[from] AnswerError),
}

/// Whether an outcome carries results or an error message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// The pipeline completed.
    #[default]
    Ok,
    /// The first text field holds an error message.
    Error,
}

/// Output of [`CoachApi::generate_q_and_a`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QaOutcome {
    /// Result status.
    pub status: OutcomeStatus,
    /// Parsed CV text, or the error message.
    pub cv_text: String,
    /// Technical questions, one per line.
    pub technical_questions: String,
    /// Behavioral questions, one per line.
    pub behavioral_questions: String,
    /// Technical `question\nanswer` blocks separated by blank lines.
    pub technical_answers: String,
    /// Behavioral `question\nanswer` blocks separated by blank lines.
    pub behavioral_answers: String,
}

impl QaOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            cv_text: message.into(),
            ..Self::default()
        }
    }
}

/// Output of [`CoachApi::answer_custom_question`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AskOutcome {
    /// Result status.
    pub status: OutcomeStatus,
    /// Answer text, or the error message.
    pub answer: String,
}

/// Output of [`CoachApi::analyze_video`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoOutcome {
    /// Result status.
    pub status: OutcomeStatus,
    /// Transcript, or the error message.
    pub transcript: String,
    /// Behavior feedback section.
    pub behavior_feedback: String,
    /// Answer feedback section.
    pub answer_feedback: String,
    /// Measured signals when the analysis completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signals: Option<VideoSignals>,
}

impl VideoOutcome {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            transcript: message.into(),
            behavior_feedback: FAILED_FIELD.to_string(),
            answer_feedback: FAILED_FIELD.to_string(),
            signals: None,
        }
    }
}

/// The actions exposed to callers such as the HTTP surface.
#[async_trait]
pub trait CoachApi: Send + Sync {
    /// Parse a CV, generate questions and answer all of them.
    async fn generate_q_and_a(&self, cv: Option<PathBuf>) -> QaOutcome;

    /// Answer a free-text question using the most recently parsed CV.
    async fn answer_custom_question(&self, question: &str) -> AskOutcome;

    /// Analyze an interview recording.
    async fn analyze_video(&self, video: Option<PathBuf>) -> VideoOutcome;

    /// Current activity counters.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Owns the pipelines, the CV session and the metrics.
pub struct InterviewCoach {
    loader: Arc<dyn CvLoader>,
    questions: QuestionGenerator,
    answers: AnswerEngine,
    video: VideoFeedbackService,
    session: CvSession,
    metrics: CoachMetrics,
}

impl InterviewCoach {
    /// Assemble a coach from prepared pipelines.
    pub fn new(
        loader: Arc<dyn CvLoader>,
        questions: QuestionGenerator,
        answers: AnswerEngine,
        video: VideoFeedbackService,
    ) -> Self {
        Self {
            loader,
            questions,
            answers,
            video,
            session: CvSession::new(),
            metrics: CoachMetrics::new(),
        }
    }

    /// Build the production coach. The retriever is created once and reused for every question.
    ///
    /// A missing or empty knowledge base is logged but does not prevent startup; answering
    /// reports it per request instead.
    pub async fn from_config(config: &Config) -> Result<Self, QdrantError> {
        let llm: Arc<dyn CompletionClient> = Arc::new(OpenAiChatClient::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            config.chat_model.clone(),
        ));
        if config.openai_api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY is not set; model calls will fail until it is provided");
        }

        let store = QdrantService::new(&config.qdrant_url, config.qdrant_api_key.clone())?;
        let retriever = QdrantRetriever::new(
            get_embedding_client(config),
            store,
            config.qdrant_collection_name.clone(),
            config.retrieval_top_k,
            config.embedding_dimension,
        );
        match retriever.ensure_ready().await {
            Ok(0) => tracing::warn!(
                collection = %config.qdrant_collection_name,
                "Knowledge base is empty; run build-index before asking questions"
            ),
            Ok(points) => tracing::info!(
                collection = %config.qdrant_collection_name,
                points,
                "Knowledge base ready"
            ),
            Err(error) => tracing::warn!(%error, "Knowledge base not available"),
        }

        Ok(Self::new(
            Arc::new(PdfCvLoader::new(config.cv_chunk_size, config.cv_chunk_overlap)),
            QuestionGenerator::new(
                llm.clone(),
                config.question_context_chunks,
                config.structured_output,
            ),
            AnswerEngine::new(Arc::new(retriever), llm.clone()),
            VideoFeedbackService::from_config(config, llm),
        ))
    }

    /// The session holding the most recently parsed CV.
    pub fn session(&self) -> &CvSession {
        &self.session
    }

    async fn run_q_and_a(&self, path: &Path) -> Result<QaOutcome, CoachError> {
        let document = self.loader.load(path).await?;
        let parsed = ParsedCv::from(&document);
        let cv_text = parsed.text.clone();
        tracing::info!(cv = %parsed.source.display(), chunks = parsed.chunk_count, "Parsed CV");
        self.session.replace(parsed);
        self.metrics.record_cv();

        let questions = self.questions.generate(&document).await?;
        let technical = self
            .answers
            .answer_all(&questions.technical, Some(&cv_text))
            .await?;
        let behavioral = self
            .answers
            .answer_all(&questions.behavioral, Some(&cv_text))
            .await?;
        self.metrics
            .record_answers((technical.len() + behavioral.len()) as u64);

        Ok(QaOutcome {
            status: OutcomeStatus::Ok,
            cv_text,
            technical_questions: questions.technical.join("\n"),
            behavioral_questions: questions.behavioral.join("\n"),
            technical_answers: render_answers(&technical),
            behavioral_answers: render_answers(&behavioral),
        })
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"))
}

#[async_trait]
impl CoachApi for InterviewCoach {
    async fn generate_q_and_a(&self, cv: Option<PathBuf>) -> QaOutcome {
        let Some(path) = cv.filter(|path| is_pdf(path)) else {
            return QaOutcome::failure(INVALID_CV_MESSAGE);
        };

        match self.run_q_and_a(&path).await {
            Ok(outcome) => outcome,
            Err(CoachError::Questions(QuestionGenerationError::Format(error))) => {
                tracing::warn!(%error, "Question generation produced no usable sections");
                self.metrics.record_failure();
                QaOutcome::failure(QUESTION_FORMAT_MESSAGE)
            }
            Err(error) => {
                tracing::error!(cv = %path.display(), %error, "Q&A pipeline failed");
                self.metrics.record_failure();
                QaOutcome::failure(format!("❌ Error: {error}"))
            }
        }
    }

    async fn answer_custom_question(&self, question: &str) -> AskOutcome {
        let Some(cv) = self.session.current() else {
            return AskOutcome {
                status: OutcomeStatus::Error,
                answer: NO_CV_MESSAGE.to_string(),
            };
        };

        match self.answers.answer(question, Some(&cv.text)).await {
            Ok(answer) => {
                self.metrics.record_answers(1);
                AskOutcome {
                    status: OutcomeStatus::Ok,
                    answer,
                }
            }
            Err(error) => {
                tracing::error!(%error, "Custom question failed");
                self.metrics.record_failure();
                AskOutcome {
                    status: OutcomeStatus::Error,
                    answer: format!("❌ Error: {error}"),
                }
            }
        }
    }

    async fn analyze_video(&self, video: Option<PathBuf>) -> VideoOutcome {
        let Some(path) = video else {
            return VideoOutcome::failure(NO_VIDEO_MESSAGE);
        };

        match self.video.analyze(&path).await {
            Ok(report) => {
                self.metrics.record_video();
                VideoOutcome {
                    status: OutcomeStatus::Ok,
                    transcript: report.signals.transcript.clone(),
                    behavior_feedback: report.feedback.behavior,
                    answer_feedback: report.feedback.answer,
                    signals: Some(report.signals),
                }
            }
            Err(VideoError::AudioMissing(audio)) => {
                tracing::warn!(video = %path.display(), audio = %audio.display(), "Audio extraction produced no file");
                self.metrics.record_failure();
                VideoOutcome::failure(AUDIO_FAILED_MESSAGE)
            }
            Err(error) => {
                tracing::error!(video = %path.display(), %error, "Video analysis failed");
                self.metrics.record_failure();
                VideoOutcome::failure(format!("❌ An error occurred: {error}"))
            }
        }
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdf_detection_ignores_case() {
        assert!(is_pdf(Path::new("cv.pdf")));
        assert!(is_pdf(Path::new("/tmp/CV.PDF")));
        assert!(!is_pdf(Path::new("cv.docx")));
        assert!(!is_pdf(Path::new("cv")));
    }

    #[test]
    fn failed_outcomes_keep_other_fields_empty() {
        let qa = QaOutcome::failure(QUESTION_FORMAT_MESSAGE);
        assert_eq!(qa.status, OutcomeStatus::Error);
        assert_eq!(qa.cv_text, QUESTION_FORMAT_MESSAGE);
        assert!(qa.technical_questions.is_empty());
        assert!(qa.behavioral_questions.is_empty());
        assert!(qa.technical_answers.is_empty());
        assert!(qa.behavioral_answers.is_empty());

        let video = VideoOutcome::failure(NO_VIDEO_MESSAGE);
        assert_eq!(video.behavior_feedback, FAILED_FIELD);
        assert_eq!(video.answer_feedback, FAILED_FIELD);
        assert!(video.signals.is_none());
    }

    #[test]
    fn outcome_status_serializes_lowercase() {
        let json = serde_json::to_value(AskOutcome::default()).expect("json");
        assert_eq!(json["status"], "ok");
        assert_eq!(
            serde_json::to_value(OutcomeStatus::Error).expect("json"),
            "error"
        );
    }
}
