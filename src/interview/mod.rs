//! CV-grounded question generation and retrieval-augmented answering.

pub mod answers;
pub mod prompts;
pub mod questions;

pub use answers::{
    AnswerEngine, AnswerError, AnsweredQuestion, QdrantRetriever, RetrievalError,
    RetrievedPassage, Retriever, compose_query, render_answers,
};
pub use questions::{
    QuestionGenerationError, QuestionGenerator, QuestionParseError, QuestionSet,
    parse_question_response, split_marked_sections,
};
