//! Retrieval-augmented answers for interview questions.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::embedding::{EmbeddingClient, EmbeddingClientError};
use crate::interview::prompts::{ANSWER_PROMPT, CANDIDATE_BACKGROUND_HEADER};
use crate::llm::{CompletionClient, CompletionRequest, LlmError, fill_template};
use crate::qdrant::{QdrantError, QdrantService, ScoredPoint};

/// Errors raised while retrieving supporting passages.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// Embedding the query failed.
    #[error("Embedding generation failed: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// The vector store rejected the request.
    #[error("Vector store error: {0}")]
    Store(#[from] QdrantError),
    /// The configured collection does not exist.
    #[error("Knowledge base collection '{0}' is not available")]
    StoreUnavailable(String),
    /// The collection exists but returned nothing for the query.
    #[error("Knowledge base collection '{0}' returned no passages")]
    EmptyStore(String),
    /// The query embedding does not match the collection's dimension.
    #[error("Query embedding has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Dimension produced by the provider.
        actual: usize,
    },
}

/// A passage returned by the knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    /// Passage text.
    pub text: String,
    /// Origin of the passage when recorded at index time.
    pub source_uri: Option<String>,
    /// Similarity score.
    pub score: f32,
}

impl RetrievedPassage {
    fn from_point(point: ScoredPoint) -> Option<Self> {
        let payload = point.payload?;
        let text = payload.get("text")?.as_str()?.to_string();
        let source_uri = payload
            .get("source_uri")
            .and_then(|value| value.as_str())
            .map(str::to_string);
        Some(Self {
            text,
            source_uri,
            score: point.score,
        })
    }
}

/// Finds knowledge-base passages relevant to a query.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return the most similar passages, best first.
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedPassage>, RetrievalError>;
}

/// [`Retriever`] backed by an embedding provider and a Qdrant collection.
pub struct QdrantRetriever {
    embedding: Box<dyn EmbeddingClient>,
    store: QdrantService,
    collection: String,
    top_k: usize,
    dimension: usize,
}

impl QdrantRetriever {
    /// Build a retriever over `collection`, returning `top_k` passages per query.
    pub fn new(
        embedding: Box<dyn EmbeddingClient>,
        store: QdrantService,
        collection: impl Into<String>,
        top_k: usize,
        dimension: usize,
    ) -> Self {
        Self {
            embedding,
            store,
            collection: collection.into(),
            top_k,
            dimension,
        }
    }

    /// Confirm the collection exists and report how many points it holds.
    pub async fn ensure_ready(&self) -> Result<u64, RetrievalError> {
        if !self.store.collection_exists(&self.collection).await? {
            return Err(RetrievalError::StoreUnavailable(self.collection.clone()));
        }
        Ok(self.store.count_points(&self.collection).await?)
    }
}

#[async_trait]
impl Retriever for QdrantRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        let vector = self
            .embedding
            .generate_embeddings(vec![query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                EmbeddingClientError::GenerationFailed("provider returned no vectors".into())
            })?;
        if vector.len() != self.dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let hits = match self
            .store
            .search_points(&self.collection, vector, self.top_k)
            .await
        {
            Ok(hits) => hits,
            Err(QdrantError::UnexpectedStatus { status, .. })
                if status == reqwest::StatusCode::NOT_FOUND =>
            {
                return Err(RetrievalError::StoreUnavailable(self.collection.clone()));
            }
            Err(error) => return Err(error.into()),
        };

        let passages: Vec<_> = hits
            .into_iter()
            .filter_map(RetrievedPassage::from_point)
            .collect();
        tracing::debug!(
            collection = %self.collection,
            passages = passages.len(),
            "Retrieved knowledge passages"
        );
        if passages.is_empty() {
            return Err(RetrievalError::EmptyStore(self.collection.clone()));
        }
        Ok(passages)
    }
}

/// Errors raised while answering a question.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// Passage retrieval failed.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
    /// The completion call failed.
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// A question paired with its generated answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnsweredQuestion {
    /// Question as generated or asked.
    pub question: String,
    /// Model answer.
    pub answer: String,
}

/// Append the candidate background to `question` when a CV is available.
pub fn compose_query(question: &str, cv_text: Option<&str>) -> String {
    match cv_text {
        Some(cv) => format!("{question}{CANDIDATE_BACKGROUND_HEADER}{cv}"),
        None => question.to_string(),
    }
}

/// Fill the answer prompt with retrieved passages and the composed query.
pub fn build_answer_prompt(passages: &[RetrievedPassage], query: &str) -> String {
    let context = passages
        .iter()
        .map(|passage| passage.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    fill_template(ANSWER_PROMPT, &[("context", context.as_str()), ("question", query)])
}

/// Render answered questions as `question\nanswer` blocks separated by blank lines.
pub fn render_answers(answers: &[AnsweredQuestion]) -> String {
    answers
        .iter()
        .map(|item| format!("{}\n{}", item.question, item.answer))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Answers questions from retrieved context.
pub struct AnswerEngine {
    retriever: Arc<dyn Retriever>,
    llm: Arc<dyn CompletionClient>,
}

impl AnswerEngine {
    /// Combine a retriever with a completion client.
    pub fn new(retriever: Arc<dyn Retriever>, llm: Arc<dyn CompletionClient>) -> Self {
        Self { retriever, llm }
    }

    /// Answer one question, optionally grounded in the candidate's CV text.
    pub async fn answer(&self, question: &str, cv_text: Option<&str>) -> Result<String, AnswerError> {
        let query = compose_query(question, cv_text);
        let passages = self.retriever.retrieve(&query).await?;
        let prompt = build_answer_prompt(&passages, &query);
        let answer = self.llm.complete(CompletionRequest::new(prompt)).await?;
        Ok(answer.trim().to_string())
    }

    /// Answer each question in order. The first failure aborts the batch.
    pub async fn answer_all(
        &self,
        questions: &[String],
        cv_text: Option<&str>,
    ) -> Result<Vec<AnsweredQuestion>, AnswerError> {
        let mut answered = Vec::with_capacity(questions.len());
        for question in questions {
            let answer = self.answer(question, cv_text).await?;
            answered.push(AnsweredQuestion {
                question: question.clone(),
                answer,
            });
        }
        Ok(answered)
    }
}
