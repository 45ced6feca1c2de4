//! Question generation and parsing.
//!
//! The model is asked for a JSON object first. When that request is disabled, or the reply
//! does not parse, the reply is split on the `Technical:`/`Behavioral:` markers instead and only
//! lines starting with a digit are kept.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingest::CvDocument;
use crate::interview::prompts::{QUESTION_PROMPT, STRUCTURED_QUESTION_PROMPT};
use crate::llm::{
    CompletionClient, CompletionRequest, LlmError, fill_template, strip_json_fences,
};

/// Label that opens the technical section.
pub const TECHNICAL_MARKER: &str = "Technical:";
/// Label that opens the behavioral section.
pub const BEHAVIORAL_MARKER: &str = "Behavioral:";

/// Raised when neither the structured nor the marker format could be recognised.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QuestionParseError {
    /// At least one section label is absent from the response.
    #[error("model response is missing section markers (technical: {technical}, behavioral: {behavioral})")]
    MissingMarkers {
        /// `true` when `Technical:` was not found.
        technical: bool,
        /// `true` when `Behavioral:` was not found.
        behavioral: bool,
    },
}

/// Parsed technical and behavioral questions, each line starting with its number.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QuestionSet {
    /// Technical questions in model order.
    pub technical: Vec<String>,
    /// Behavioral questions in model order.
    pub behavioral: Vec<String>,
}

impl QuestionSet {
    /// Total number of questions.
    pub fn len(&self) -> usize {
        self.technical.len() + self.behavioral.len()
    }

    /// Whether both sections are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// JSON shape requested from the model in structured mode.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
struct GeneratedQuestions {
    /// Five technical interview questions.
    technical: Vec<String>,
    /// Five behavioral interview questions.
    behavioral: Vec<String>,
}

/// Build the question-generation prompt from the leading CV chunks.
pub fn build_question_prompt(chunks: &[String], structured: bool) -> String {
    let snippet = chunks.join("\n\n");
    if structured {
        let schema = serde_json::to_string_pretty(&schemars::schema_for!(GeneratedQuestions))
            .unwrap_or_default();
        fill_template(
            STRUCTURED_QUESTION_PROMPT,
            &[("schema", schema.as_str()), ("snippet", snippet.as_str())],
        )
    } else {
        fill_template(QUESTION_PROMPT, &[("snippet", snippet.as_str())])
    }
}

/// Parse a model reply, preferring the JSON shape and falling back to marker splitting.
pub fn parse_question_response(raw: &str) -> Result<QuestionSet, QuestionParseError> {
    if let Ok(generated) = serde_json::from_str::<GeneratedQuestions>(strip_json_fences(raw)) {
        return Ok(QuestionSet {
            technical: number_questions(generated.technical),
            behavioral: number_questions(generated.behavioral),
        });
    }
    split_marked_sections(raw)
}

/// Split a marker-formatted reply into its two sections.
///
/// Each section runs from the end of its label to the start of the other label when that
/// label comes later, otherwise to the end of the text. A label repeated at the start of a
/// line is stripped before the digit check.
pub fn split_marked_sections(raw: &str) -> Result<QuestionSet, QuestionParseError> {
    let technical_at = raw.find(TECHNICAL_MARKER);
    let behavioral_at = raw.find(BEHAVIORAL_MARKER);
    let (Some(t), Some(b)) = (technical_at, behavioral_at) else {
        return Err(QuestionParseError::MissingMarkers {
            technical: technical_at.is_none(),
            behavioral: behavioral_at.is_none(),
        });
    };

    let technical_start = t + TECHNICAL_MARKER.len();
    let behavioral_start = b + BEHAVIORAL_MARKER.len();
    let technical = if t < b {
        &raw[technical_start..b]
    } else {
        &raw[technical_start..]
    };
    let behavioral = if b < t {
        &raw[behavioral_start..t]
    } else {
        &raw[behavioral_start..]
    };

    Ok(QuestionSet {
        technical: numbered_lines(technical),
        behavioral: numbered_lines(behavioral),
    })
}

fn numbered_lines(section: &str) -> Vec<String> {
    section
        .trim_start_matches([' ', '\t'])
        .lines()
        .map(strip_repeated_marker)
        .filter(|line| !line.trim().is_empty())
        .filter(|line| line.chars().next().is_some_and(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

fn strip_repeated_marker(line: &str) -> &str {
    for marker in [TECHNICAL_MARKER, BEHAVIORAL_MARKER] {
        if let Some(rest) = line.trim_start().strip_prefix(marker) {
            return rest.trim_start();
        }
    }
    line
}

fn number_questions(questions: Vec<String>) -> Vec<String> {
    questions
        .into_iter()
        .map(|question| question.trim().to_string())
        .filter(|question| !question.is_empty())
        .enumerate()
        .map(|(index, question)| {
            if question.starts_with(|c: char| c.is_ascii_digit()) {
                question
            } else {
                format!("{}. {question}", index + 1)
            }
        })
        .collect()
}

/// Errors raised while generating questions.
#[derive(Debug, Error)]
pub enum QuestionGenerationError {
    /// The completion call failed.
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// The reply could not be parsed into sections.
    #[error(transparent)]
    Format(#[from] QuestionParseError),
}

/// Generates CV-grounded questions with a deterministic-leaning completion.
pub struct QuestionGenerator {
    llm: Arc<dyn CompletionClient>,
    context_chunks: usize,
    structured: bool,
}

impl QuestionGenerator {
    /// Generator embedding the first `context_chunks` chunks in its prompt.
    pub fn new(llm: Arc<dyn CompletionClient>, context_chunks: usize, structured: bool) -> Self {
        Self {
            llm,
            context_chunks,
            structured,
        }
    }

    /// Ask the model for questions about `document` and parse the reply.
    pub async fn generate(
        &self,
        document: &CvDocument,
    ) -> Result<QuestionSet, QuestionGenerationError> {
        let prompt = build_question_prompt(document.head(self.context_chunks), self.structured);
        let request = CompletionRequest::new(prompt)
            .with_temperature(0.0)
            .with_json_mode(self.structured);
        let raw = self.llm.complete(request).await?;

        let questions = parse_question_response(&raw).inspect_err(|error| {
            tracing::warn!(%error, "Question response did not match the expected format");
        })?;
        tracing::info!(
            technical = questions.technical.len(),
            behavioral = questions.behavioral.len(),
            structured = self.structured,
            "Generated interview questions"
        );
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::Mutex;

    const MARKED_REPLY: &str = "Sure! Here are your questions.\n\
Technical:\n\
1. How did you use Python in production?\n\
2. Explain a data pipeline you built.\n\
These focus on your skills.\n\
Behavioral:\n\
1. Describe leading your team of 4.\n\
2. Tell me about a conflict you resolved.\n\
Good luck!";

    #[test]
    fn marker_split_keeps_only_numbered_lines() {
        let set = split_marked_sections(MARKED_REPLY).expect("sections");
        assert_eq!(
            set.technical,
            vec![
                "1. How did you use Python in production?",
                "2. Explain a data pipeline you built."
            ]
        );
        assert_eq!(
            set.behavioral,
            vec![
                "1. Describe leading your team of 4.",
                "2. Tell me about a conflict you resolved."
            ]
        );
    }

    #[test]
    fn sections_are_disjoint() {
        let set = split_marked_sections(MARKED_REPLY).expect("sections");
        assert!(set.technical.iter().all(|q| !set.behavioral.contains(q)));
    }

    #[test]
    fn missing_marker_is_reported() {
        let error = split_marked_sections("Technical:\n1. Only one section").unwrap_err();
        assert_eq!(
            error,
            QuestionParseError::MissingMarkers {
                technical: false,
                behavioral: true
            }
        );
        assert!(matches!(
            parse_question_response("no sections at all"),
            Err(QuestionParseError::MissingMarkers {
                technical: true,
                behavioral: true
            })
        ));
    }

    #[test]
    fn behavioral_first_ordering_is_supported() {
        let raw = "Behavioral:\n1. B one\nTechnical:\n1. T one\n2. T two";
        let set = split_marked_sections(raw).expect("sections");
        assert_eq!(set.behavioral, vec!["1. B one"]);
        assert_eq!(set.technical, vec!["1. T one", "2. T two"]);
    }

    #[test]
    fn repeated_markers_at_line_start_are_stripped() {
        let raw = "Technical: 1. First\nTechnical: 2. Second\nBehavioral: 1. Third\nBehavioral: 2. Fourth";
        let set = split_marked_sections(raw).expect("sections");
        assert_eq!(set.technical, vec!["1. First", "2. Second"]);
        assert_eq!(set.behavioral, vec!["1. Third", "2. Fourth"]);
    }

    #[test]
    fn indented_lines_fail_the_digit_check() {
        let raw = "Technical:\n  1. indented\n1. flush\nBehavioral:\n- bullet\n2. kept";
        let set = split_marked_sections(raw).expect("sections");
        assert_eq!(set.technical, vec!["1. flush"]);
        assert_eq!(set.behavioral, vec!["2. kept"]);
    }

    #[test]
    fn structured_reply_is_numbered() {
        let raw = "```json\n{\"technical\": [\"What is Rust?\", \"2. Already numbered\", \" \"], \"behavioral\": [\"Describe a failure.\"]}\n```";
        let set = parse_question_response(raw).expect("structured");
        assert_eq!(
            set.technical,
            vec!["1. What is Rust?", "2. Already numbered"]
        );
        assert_eq!(set.behavioral, vec!["1. Describe a failure."]);
    }

    #[test]
    fn structured_prompt_embeds_schema_and_snippet() {
        let prompt = build_question_prompt(&["Python".into(), "Team lead".into()], true);
        assert!(prompt.contains("\"technical\""));
        assert!(prompt.contains("\"behavioral\""));
        assert!(prompt.contains("Python\n\nTeam lead"));

        let marked = build_question_prompt(&["Python".into()], false);
        assert!(marked.contains(TECHNICAL_MARKER));
        assert!(marked.contains(BEHAVIORAL_MARKER));
        assert!(marked.ends_with("Python"));
    }

    struct RecordingLlm {
        reply: String,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl CompletionClient for RecordingLlm {
        async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
            self.requests.lock().expect("lock").push(request);
            Ok(self.reply.clone())
        }
    }

    #[tokio::test]
    async fn generator_uses_two_leading_chunks_at_zero_temperature() {
        let llm = Arc::new(RecordingLlm {
            reply: MARKED_REPLY.into(),
            requests: Mutex::new(Vec::new()),
        });
        let generator = QuestionGenerator::new(llm.clone(), 2, false);
        let document = CvDocument {
            source: PathBuf::from("cv.pdf"),
            chunks: vec!["chunk-one".into(), "chunk-two".into(), "chunk-three".into()],
        };

        let set = generator.generate(&document).await.expect("questions");
        assert_eq!(set.len(), 4);

        let requests = llm.requests.lock().expect("lock");
        let request = &requests[0];
        assert_eq!(request.temperature, Some(0.0));
        assert!(!request.json_mode);
        assert!(request.prompt.contains("chunk-one\n\nchunk-two"));
        assert!(!request.prompt.contains("chunk-three"));
    }
}
