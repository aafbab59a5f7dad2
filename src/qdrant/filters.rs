//! Filter helpers for Qdrant queries over the knowledge collection.

use serde_json::{Value, json};

use super::types::KnowledgeFilter;

/// Compose a `must` filter from the populated fields of `filter`.
///
/// Returns `None` when no field carries a non-blank value.
pub fn build_knowledge_filter(filter: &KnowledgeFilter) -> Option<Value> {
    let fields = [
        ("locale", filter.locale.as_deref()),
        ("source_id", filter.source_id.as_deref()),
        ("content_type", filter.content_type.as_deref()),
    ];

    let must: Vec<Value> = fields
        .into_iter()
        .filter_map(|(key, value)| value.and_then(non_empty).map(|value| (key, value)))
        .map(|(key, value)| {
            json!({
                "key": key,
                "match": { "value": value }
            })
        })
        .collect();

    if must.is_empty() {
        None
    } else {
        Some(json!({ "must": must }))
    }
}

fn non_empty(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
