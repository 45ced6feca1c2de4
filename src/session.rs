//! Single-slot store for the most recently parsed CV.

use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::ingest::CvDocument;

/// Flat CV text cached for follow-up questions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCv {
    /// File the CV was read from.
    pub source: PathBuf,
    /// Chunks joined with blank lines.
    pub text: String,
    /// Number of chunks the text was built from.
    pub chunk_count: usize,
}

impl From<&CvDocument> for ParsedCv {
    fn from(document: &CvDocument) -> Self {
        Self {
            source: document.source.clone(),
            text: document.flatten(),
            chunk_count: document.chunks.len(),
        }
    }
}

/// Holds at most one parsed CV. A new upload replaces the previous one (last write wins).
#[derive(Debug, Default)]
pub struct CvSession {
    slot: RwLock<Option<Arc<ParsedCv>>>,
}

impl CvSession {
    /// Create an empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `cv`, returning whatever it replaced.
    pub fn replace(&self, cv: ParsedCv) -> Option<Arc<ParsedCv>> {
        let mut guard = self
            .slot
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let previous = guard.replace(Arc::new(cv));
        if let Some(previous) = &previous {
            tracing::debug!(previous = %previous.source.display(), "Replacing cached CV");
        }
        previous
    }

    /// The cached CV, if any.
    pub fn current(&self) -> Option<Arc<ParsedCv>> {
        self.slot
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cv(name: &str, text: &str) -> ParsedCv {
        ParsedCv {
            source: PathBuf::from(name),
            text: text.into(),
            chunk_count: 1,
        }
    }

    #[test]
    fn empty_session_has_no_cv() {
        assert!(CvSession::new().current().is_none());
    }

    #[test]
    fn last_write_wins() {
        let session = CvSession::new();
        assert!(session.replace(cv("a.pdf", "first")).is_none());
        let previous = session.replace(cv("b.pdf", "second")).expect("previous");
        assert_eq!(previous.text, "first");
        assert_eq!(session.current().expect("current").text, "second");
    }

    #[test]
    fn parsed_cv_from_document_flattens_chunks() {
        let document = CvDocument {
            source: PathBuf::from("cv.pdf"),
            chunks: vec!["one".into(), "two".into()],
        };
        let parsed = ParsedCv::from(&document);
        assert_eq!(parsed.text, "one\n\ntwo");
        assert_eq!(parsed.chunk_count, 2);
    }
}
