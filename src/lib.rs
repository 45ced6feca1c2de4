#![deny(missing_docs)]

//! Interview preparation assistant: CV-grounded questions, retrieval-backed answers, and
//! feedback on recorded interview videos.

/// HTTP routing and REST handlers.
pub mod api;
/// User-facing actions and their error boundary.
pub mod coach;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Document loading and chunking.
pub mod ingest;
/// Question generation and answer synthesis.
pub mod interview;
/// Chat-completion client.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Activity counters.
pub mod metrics;
/// Qdrant vector store integration.
pub mod qdrant;
/// Cached CV state shared between requests.
pub mod session;
/// Video analysis pipeline.
pub mod video;
