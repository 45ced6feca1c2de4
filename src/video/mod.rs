//! Video analysis: audio transcription, facial expression, posture and blink heuristics, and
//! model-written feedback.

pub mod emotion;
pub mod feedback;
pub mod media;
pub mod posture;
pub mod service;
pub mod transcribe;

pub use emotion::{EmotionClassifier, UNKNOWN_EMOTION};
pub use feedback::{FeedbackSections, VideoSignals, split_feedback};
pub use media::{AudioExtractor, FrameDecoder, FrameStream, MediaError};
pub use posture::{BehaviorTally, PoseEstimator, ShoulderLandmarks};
pub use service::{VideoError, VideoFeedbackService, VideoReport};
pub use transcribe::SpeechTranscriber;
