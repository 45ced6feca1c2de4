//! CV and document ingestion: PDF extraction followed by overlapping chunking.

pub mod chunking;
pub mod pdf;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use chunking::{ChunkingError, chunk_text};
pub use pdf::load_pdf_text;

/// Errors raised while loading a document.
#[derive(Debug, Error)]
pub enum IngestError {
    /// No file exists at the supplied path.
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    /// The PDF could not be parsed.
    #[error("Failed to read PDF {path}: {message}")]
    Pdf {
        /// Offending file.
        path: PathBuf,
        /// Extractor diagnostic.
        message: String,
    },
    /// The document contained no extractable text.
    #[error("Document {0} contains no extractable text")]
    EmptyDocument(PathBuf),
    /// Reading a plain-text document failed.
    #[error("Failed to read {path}: {source}")]
    Io {
        /// Offending file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file extension is not one the loader understands.
    #[error("Unsupported document type: {0}")]
    Unsupported(PathBuf),
    /// Chunking rejected the configured budget.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
}

/// A loaded document split into ordered, overlapping chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CvDocument {
    /// Where the document was read from.
    pub source: PathBuf,
    /// Chunks in document order.
    pub chunks: Vec<String>,
}

impl CvDocument {
    /// Concatenate every chunk with a blank line between neighbours.
    pub fn flatten(&self) -> String {
        self.chunks.join("\n\n")
    }

    /// The first `count` chunks (fewer when the document is short).
    pub fn head(&self, count: usize) -> &[String] {
        &self.chunks[..count.min(self.chunks.len())]
    }
}

/// Loads a CV from the filesystem into chunks.
#[async_trait]
pub trait CvLoader: Send + Sync {
    /// Read and chunk the document at `path`.
    async fn load(&self, path: &Path) -> Result<CvDocument, IngestError>;
}

/// Production loader: `pdf-extract` followed by [`chunk_text`].
pub struct PdfCvLoader {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl PdfCvLoader {
    /// Loader using the given character budget and overlap.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }
}

#[async_trait]
impl CvLoader for PdfCvLoader {
    async fn load(&self, path: &Path) -> Result<CvDocument, IngestError> {
        let text = load_pdf_text(path).await?;
        let chunks = chunk_text(&text, self.chunk_size, self.chunk_overlap)?;
        tracing::info!(
            path = %path.display(),
            chunks = chunks.len(),
            chunk_size = self.chunk_size,
            overlap = self.chunk_overlap,
            "CV loaded"
        );
        Ok(CvDocument {
            source: path.to_path_buf(),
            chunks,
        })
    }
}

/// Read a knowledge document (`.pdf`, `.txt`, `.md`) as plain text.
pub async fn read_document_text(path: &Path) -> Result<String, IngestError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("pdf") => load_pdf_text(path).await,
        Some("txt") | Some("md") | Some("markdown") => tokio::fs::read_to_string(path)
            .await
            .map_err(|source| IngestError::Io {
                path: path.to_path_buf(),
                source,
            }),
        _ => Err(IngestError::Unsupported(path.to_path_buf())),
    }
}
