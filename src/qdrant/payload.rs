//! Helpers for constructing and hashing Qdrant payloads.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

use super::types::KnowledgePoint;

/// Build the payload object stored alongside each indexed knowledge chunk.
pub(crate) fn build_payload(point: &KnowledgePoint, timestamp_rfc3339: &str) -> Value {
    let mut payload = Map::new();
    payload.insert("doc_id".into(), Value::String(point.doc_id.clone()));
    payload.insert(
        "timestamp".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    payload.insert(
        "chunk_hash".into(),
        Value::String(point.chunk_hash.clone()),
    );
    payload.insert("text".into(), Value::String(point.text.clone()));

    if let Some(source_uri) = point
        .source_uri
        .as_ref()
        .filter(|value| !value.is_empty())
    {
        payload.insert("source_uri".into(), Value::String(source_uri.clone()));
    }

    Value::Object(payload)
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Point identifier derived from the chunk hash, so re-indexing the same text overwrites the
/// existing point instead of adding a duplicate.
pub(crate) fn point_id_for(chunk_hash: &str) -> String {
    let digest = Sha256::digest(chunk_hash.as_bytes());
    let mut bytes = [0_u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Uuid::from_bytes(bytes).to_string()
}
