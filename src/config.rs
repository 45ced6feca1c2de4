use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the interview coach.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// API key for the OpenAI-compatible endpoints. Only checked when a call is made.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible API (chat, embeddings, transcriptions).
    pub openai_base_url: String,
    /// Chat model used for question generation, answer synthesis and feedback.
    pub chat_model: String,
    /// Embedding provider used to vectorize retrieval queries and indexed documents.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the Qdrant instance that holds the knowledge store.
    pub qdrant_url: String,
    /// Name of the Qdrant collection queried for retrieval.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Number of passages retrieved per question.
    pub retrieval_top_k: usize,
    /// Maximum CV chunk length in characters.
    pub cv_chunk_size: usize,
    /// Characters of the previous chunk repeated at the start of the next one.
    pub cv_chunk_overlap: usize,
    /// Number of leading CV chunks embedded in the question-generation prompt.
    pub question_context_chunks: usize,
    /// Request JSON output from the model before falling back to marker parsing.
    pub structured_output: bool,
    /// Speech-to-text model name.
    pub transcription_model: String,
    /// `ffmpeg` executable.
    pub ffmpeg_bin: String,
    /// `ffprobe` executable.
    pub ffprobe_bin: String,
    /// Where extracted audio is written (overwritten on every analysis).
    pub audio_output_path: PathBuf,
    /// Face-emotion classifier endpoint. Unset disables the classifier.
    pub emotion_service_url: Option<String>,
    /// Pose-landmark estimator endpoint. Unset disables posture scoring.
    pub pose_service_url: Option<String>,
    /// Thresholds and crop geometry for the frame heuristics.
    pub behavior: BehaviorSettings,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// File that receives a copy of the logs; `None` logs to stdout only.
    pub log_file: Option<PathBuf>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Deterministic in-process hashing; useful for dry runs without network access.
    Local,
}

/// Heuristic thresholds used by the video pipeline.
///
/// None of these values are calibrated; they are exposed so deployments can tune them for
/// their camera setup and lighting.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BehaviorSettings {
    /// Shoulder y-asymmetry (normalized) above which a frame counts as a posture issue.
    pub posture_asymmetry_threshold: f32,
    /// Posture score above which posture is labeled `unstable`.
    pub posture_unstable_threshold: f64,
    /// Blink rate above which blinking is labeled `frequent`.
    pub blink_frequent_threshold: f64,
    /// Mean grayscale intensity below which the eye region counts as closed.
    pub eye_brightness_threshold: f64,
    /// Fixed eye-region rectangle in pixel coordinates.
    pub eye_region: EyeRegion,
}

/// Pixel rectangle cropped from each frame for the blink heuristic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EyeRegion {
    /// Left edge.
    pub x: u32,
    /// Top edge.
    pub y: u32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for EyeRegion {
    fn default() -> Self {
        Self {
            x: 250,
            y: 100,
            width: 150,
            height: 50,
        }
    }
}

impl FromStr for EyeRegion {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|part| part.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| ())?;
        match parts.as_slice() {
            [x, y, width, height] => Ok(Self {
                x: *x,
                y: *y,
                width: *width,
                height: *height,
            }),
            _ => Err(()),
        }
    }
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            posture_asymmetry_threshold: 0.05,
            posture_unstable_threshold: 0.05,
            blink_frequent_threshold: 0.08,
            eye_brightness_threshold: 70.0,
            eye_region: EyeRegion::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = BehaviorSettings::default();
        Ok(Self {
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            chat_model: load_env_or("CHAT_MODEL", "gpt-3.5-turbo"),
            embedding_provider: load_env_optional("EMBEDDING_PROVIDER")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".into()))
                })
                .transpose()?
                .unwrap_or(EmbeddingProvider::OpenAI),
            embedding_model: load_env_or("EMBEDDING_MODEL", "text-embedding-ada-002"),
            embedding_dimension: parse_env("EMBEDDING_DIMENSION")?.unwrap_or(1536),
            qdrant_url: load_env_or("QDRANT_URL", "http://127.0.0.1:6333"),
            qdrant_collection_name: load_env_or("QDRANT_COLLECTION_NAME", "interview-knowledge"),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            retrieval_top_k: parse_env("RETRIEVAL_TOP_K")?.unwrap_or(4),
            cv_chunk_size: parse_env("CV_CHUNK_SIZE")?.unwrap_or(500),
            cv_chunk_overlap: parse_env("CV_CHUNK_OVERLAP")?.unwrap_or(50),
            question_context_chunks: parse_env("QUESTION_CONTEXT_CHUNKS")?.unwrap_or(2),
            structured_output: parse_bool_env("STRUCTURED_OUTPUT")?.unwrap_or(true),
            transcription_model: load_env_or("TRANSCRIPTION_MODEL", "whisper-1"),
            ffmpeg_bin: load_env_or("FFMPEG_BIN", "ffmpeg"),
            ffprobe_bin: load_env_or("FFPROBE_BIN", "ffprobe"),
            audio_output_path: PathBuf::from(load_env_or("AUDIO_OUTPUT_PATH", "audio.wav")),
            emotion_service_url: load_env_optional("EMOTION_SERVICE_URL"),
            pose_service_url: load_env_optional("POSE_SERVICE_URL"),
            behavior: BehaviorSettings {
                posture_asymmetry_threshold: parse_env("POSTURE_ASYMMETRY_THRESHOLD")?
                    .unwrap_or(defaults.posture_asymmetry_threshold),
                posture_unstable_threshold: parse_env("POSTURE_UNSTABLE_THRESHOLD")?
                    .unwrap_or(defaults.posture_unstable_threshold),
                blink_frequent_threshold: parse_env("BLINK_FREQUENT_THRESHOLD")?
                    .unwrap_or(defaults.blink_frequent_threshold),
                eye_brightness_threshold: parse_env("EYE_BRIGHTNESS_THRESHOLD")?
                    .unwrap_or(defaults.eye_brightness_threshold),
                eye_region: load_env_optional("EYE_REGION")
                    .map(|value| {
                        value
                            .parse()
                            .map_err(|()| ConfigError::InvalidValue("EYE_REGION".into()))
                    })
                    .transpose()?
                    .unwrap_or(defaults.eye_region),
            },
            server_port: parse_env("SERVER_PORT")?,
            log_file: parse_log_file(load_env_optional("INTERVIEW_COACH_LOG_FILE")),
        })
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

const DEFAULT_LOG_FILE: &str = "logs/interview-coach.log";

/// Unset means the default file; `off` disables file logging.
fn parse_log_file(value: Option<String>) -> Option<PathBuf> {
    match value {
        Some(value) if value.trim().eq_ignore_ascii_case("off") => None,
        Some(value) => Some(PathBuf::from(value.trim())),
        None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
    }
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_env<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_bool_env(key: &str) -> Result<Option<bool>, ConfigError> {
    load_env_optional(key)
        .map(|value| match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key.to_string())),
        })
        .transpose()
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "local" => Ok(Self::Local),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    CONFIG.set(config).expect("Failed to set config");
}
