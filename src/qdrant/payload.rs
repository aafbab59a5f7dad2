//! Helpers for constructing, decoding and identifying knowledge payloads.

use crate::knowledge::KnowledgeChunk;
use crate::locale::Locale;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use uuid::Uuid;

/// Build the payload object stored alongside each indexed chunk.
pub fn build_payload(
    chunk: &KnowledgeChunk,
    chunk_hash: &str,
    timestamp_rfc3339: &str,
) -> Result<Map<String, Value>, serde_json::Error> {
    let mut payload = match serde_json::to_value(chunk)? {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("text".into(), other);
            map
        }
    };
    payload.insert("chunk_hash".into(), Value::String(chunk_hash.to_string()));
    payload.insert(
        "updated_at".into(),
        Value::String(timestamp_rfc3339.to_string()),
    );
    Ok(payload)
}

/// Decode a stored payload back into a chunk. Bookkeeping fields are ignored.
pub fn parse_payload(payload: Map<String, Value>) -> Result<KnowledgeChunk, serde_json::Error> {
    serde_json::from_value(Value::Object(payload))
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    hex::encode(digest)
}

/// Deterministic point id for a chunk, so re-indexing overwrites instead of duplicating.
pub fn point_id(source_id: &str, locale: Locale, chunk_index: usize) -> String {
    let name = format!("{source_id}/{locale}/{chunk_index}");
    Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
}

/// Current timestamp formatted for payload storage.
pub fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
