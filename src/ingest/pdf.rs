//! PDF text extraction.

use std::path::{Path, PathBuf};

use super::IngestError;

/// Extract the text of every page of the PDF at `path`.
///
/// `pdf-extract` is synchronous and can panic on malformed input, so extraction runs on the
/// blocking pool and a panic is reported as a corrupt document.
pub async fn load_pdf_text(path: &Path) -> Result<String, IngestError> {
    if !path.is_file() {
        return Err(IngestError::NotFound(path.to_path_buf()));
    }

    let owned: PathBuf = path.to_path_buf();
    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text(&owned))
        .await
        .map_err(|join_error| IngestError::Pdf {
            path: path.to_path_buf(),
            message: format!("extractor aborted: {join_error}"),
        })?;

    let text = extracted.map_err(|error| IngestError::Pdf {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;

    if text.trim().is_empty() {
        return Err(IngestError::EmptyDocument(path.to_path_buf()));
    }

    tracing::debug!(path = %path.display(), chars = text.chars().count(), "Extracted PDF text");
    Ok(text)
}
