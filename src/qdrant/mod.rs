//! Qdrant vector store integration: the persisted knowledge index queried by retrieval.

pub mod client;
pub mod payload;
pub mod types;

pub use client::QdrantService;
pub use payload::compute_chunk_hash;
pub use types::{IndexSummary, KnowledgePoint, QdrantError, ScoredPoint};
