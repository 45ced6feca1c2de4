//! Interview feedback from behavioral signals and the transcript.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::config::BehaviorSettings;
use crate::llm::{
    CompletionClient, CompletionRequest, LlmError, fill_template, strip_json_fences,
};

/// Heading that opens the behavior section.
pub const BEHAVIOR_HEADING: &str = "📉 Behavior Feedback";
/// Heading that opens the answer section; also the split marker.
pub const ANSWER_HEADING: &str = "📢 Answer Feedback";
/// Answer section used when the model omitted the answer heading.
pub const FEEDBACK_INCOMPLETE: &str = "❌ Failed to generate full feedback";
/// System message for feedback requests.
pub const COACH_SYSTEM_PROMPT: &str = "You are an expert interview coach.";

const FEEDBACK_PROMPT: &str = "\
You give professional feedback on mock interview performance. The candidate showed:
- Facial expression: {emotion}
- Posture: {posture}
- Blinking: {blink}
- Transcript: {transcript}

{format}";

const MARKED_FORMAT: &str = "\
Write two sections, each starting with its heading on its own line:
📉 Behavior Feedback
(comment on expression, posture and eye contact)
📢 Answer Feedback
(comment on the content, structure and clarity of the answers)";

const STRUCTURED_FORMAT: &str = "\
Respond with a single JSON object matching this schema and nothing else. \
`behavior_feedback` covers expression, posture and eye contact; `answer_feedback` covers the \
content, structure and clarity of the answers.
{schema}";

/// `unstable` when `score` exceeds `threshold`, otherwise `stable`.
pub fn posture_label(score: f64, threshold: f64) -> &'static str {
    if score > threshold { "unstable" } else { "stable" }
}

/// `frequent` when `rate` exceeds `threshold`, otherwise `steady`.
pub fn blink_label(rate: f64, threshold: f64) -> &'static str {
    if rate > threshold { "frequent" } else { "steady" }
}

/// Everything measured from one video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoSignals {
    /// Dominant emotion of the first frame, or `Unknown`.
    pub emotion: String,
    /// Share of frames with a posture issue.
    pub posture_score: f64,
    /// Share of frames counted as blinks.
    pub blink_rate: f64,
    /// Speech transcript.
    pub transcript: String,
}

/// The two rendered feedback sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedbackSections {
    /// Feedback on non-verbal behavior.
    pub behavior: String,
    /// Feedback on answer content, starting with [`ANSWER_HEADING`].
    pub answer: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct StructuredFeedback {
    /// Feedback on facial expression, posture and blinking.
    behavior_feedback: String,
    /// Feedback on the spoken answers.
    answer_feedback: String,
}

/// Build the feedback prompt, labelling the scores with the configured thresholds.
pub fn build_feedback_prompt(
    signals: &VideoSignals,
    settings: &BehaviorSettings,
    structured: bool,
) -> String {
    let format = if structured {
        let schema = serde_json::to_string_pretty(&schemars::schema_for!(StructuredFeedback))
            .unwrap_or_default();
        fill_template(STRUCTURED_FORMAT, &[("schema", schema.as_str())])
    } else {
        MARKED_FORMAT.to_string()
    };

    fill_template(
        FEEDBACK_PROMPT,
        &[
            (
                "posture",
                posture_label(signals.posture_score, settings.posture_unstable_threshold),
            ),
            (
                "blink",
                blink_label(signals.blink_rate, settings.blink_frequent_threshold),
            ),
            ("emotion", signals.emotion.as_str()),
            ("format", format.as_str()),
            ("transcript", signals.transcript.as_str()),
        ],
    )
}

/// Split a marker-formatted response on the first [`ANSWER_HEADING`].
pub fn split_feedback(text: &str) -> FeedbackSections {
    let Some((before, after)) = text.split_once(ANSWER_HEADING) else {
        tracing::warn!("Feedback response has no answer section");
        return FeedbackSections {
            behavior: text.trim().to_string(),
            answer: FEEDBACK_INCOMPLETE.to_string(),
        };
    };
    if after.contains(ANSWER_HEADING) {
        tracing::debug!("Answer heading repeated in feedback; keeping the extra text in the answer section");
    }
    FeedbackSections {
        behavior: before.trim().to_string(),
        answer: format!("{ANSWER_HEADING}\n{}", after.trim()),
    }
}

/// Parse a feedback response, preferring the JSON shape and falling back to [`split_feedback`].
pub fn parse_feedback_response(raw: &str) -> FeedbackSections {
    match serde_json::from_str::<StructuredFeedback>(strip_json_fences(raw)) {
        Ok(feedback) => FeedbackSections {
            behavior: format!("{BEHAVIOR_HEADING}\n{}", feedback.behavior_feedback.trim()),
            answer: format!("{ANSWER_HEADING}\n{}", feedback.answer_feedback.trim()),
        },
        Err(_) => split_feedback(raw),
    }
}

/// Produces feedback sections with a completion model.
pub struct FeedbackGenerator {
    llm: Arc<dyn CompletionClient>,
    structured: bool,
}

impl FeedbackGenerator {
    /// Generator asking for JSON output when `structured` is set.
    pub fn new(llm: Arc<dyn CompletionClient>, structured: bool) -> Self {
        Self { llm, structured }
    }

    /// Ask the model for feedback on `signals`.
    pub async fn generate(
        &self,
        signals: &VideoSignals,
        settings: &BehaviorSettings,
    ) -> Result<FeedbackSections, LlmError> {
        let request = CompletionRequest::new(build_feedback_prompt(signals, settings, self.structured))
            .with_system(COACH_SYSTEM_PROMPT)
            .with_json_mode(self.structured);
        let raw = self.llm.complete(request).await?;
        Ok(parse_feedback_response(&raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals() -> VideoSignals {
        VideoSignals {
            emotion: "neutral".into(),
            posture_score: 0.12,
            blink_rate: 0.02,
            transcript: "I built a data pipeline.".into(),
        }
    }

    #[test]
    fn labels_use_strict_thresholds() {
        assert_eq!(posture_label(0.05, 0.05), "stable");
        assert_eq!(posture_label(0.0501, 0.05), "unstable");
        assert_eq!(blink_label(0.08, 0.08), "steady");
        assert_eq!(blink_label(0.5, 0.08), "frequent");
    }

    #[test]
    fn prompt_carries_labels_and_transcript() {
        let prompt = build_feedback_prompt(&signals(), &BehaviorSettings::default(), false);
        assert!(prompt.contains("Facial expression: neutral"));
        assert!(prompt.contains("Posture: unstable"));
        assert!(prompt.contains("Blinking: steady"));
        assert!(prompt.contains("Transcript: I built a data pipeline."));
        assert!(prompt.contains(ANSWER_HEADING));

        let structured = build_feedback_prompt(&signals(), &BehaviorSettings::default(), true);
        assert!(structured.contains("behavior_feedback"));
        assert!(structured.contains("answer_feedback"));
    }

    #[test]
    fn split_reconstructs_response() {
        let response = "📉 Behavior Feedback\nSit up straight.\n\n📢 Answer Feedback\nGood STAR structure.\n";
        let sections = split_feedback(response);
        assert_eq!(sections.behavior, "📉 Behavior Feedback\nSit up straight.");
        assert_eq!(sections.answer, "📢 Answer Feedback\nGood STAR structure.");

        let strip = |text: &str| text.split_whitespace().collect::<String>();
        assert_eq!(
            strip(&format!("{}{}", sections.behavior, sections.answer)),
            strip(response)
        );
    }

    #[test]
    fn missing_marker_keeps_whole_response_as_behavior() {
        let sections = split_feedback("  Only behavior notes.  ");
        assert_eq!(sections.behavior, "Only behavior notes.");
        assert_eq!(sections.answer, FEEDBACK_INCOMPLETE);
    }

    #[test]
    fn repeated_marker_stays_in_answer() {
        let sections = split_feedback("B\n📢 Answer Feedback\nfirst\n📢 Answer Feedback\nsecond");
        assert_eq!(sections.behavior, "B");
        assert!(sections.answer.ends_with("first\n📢 Answer Feedback\nsecond"));
    }

    #[test]
    fn structured_response_is_rendered_with_headings() {
        let sections = parse_feedback_response(
            r#"{"behavior_feedback": " Relax your shoulders. ", "answer_feedback": "Quantify results."}"#,
        );
        assert_eq!(sections.behavior, "📉 Behavior Feedback\nRelax your shoulders.");
        assert_eq!(sections.answer, "📢 Answer Feedback\nQuantify results.");
    }
}
