//! Conversions between processed chunks and Qdrant point payloads.

use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::types::{QueryPoint, RetrievedDocument};
use crate::ingestion::ProcessedChunk;

/// Build the payload object stored alongside each indexed chunk.
///
/// The shape mirrors the processed chunk itself: `{ "text": ..., "metadata": { ... } }`.
pub(crate) fn build_payload(chunk: &ProcessedChunk) -> Value {
    json!({
        "text": chunk.text(),
        "metadata": chunk.metadata(),
    })
}

/// Generate an identifier for a new point.
pub(crate) fn generate_point_id() -> String {
    Uuid::new_v4().to_string()
}

/// Rebuild a retrieved document from a scored point. Points without text are skipped.
pub(crate) fn parse_point(point: QueryPoint) -> Option<RetrievedDocument> {
    let mut payload = point.payload?;
    let text = match payload.remove("text") {
        Some(Value::String(text)) => text,
        _ => return None,
    };
    let metadata = match payload.remove("metadata") {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    Some(RetrievedDocument {
        text,
        metadata,
        score: point.score,
    })
}
