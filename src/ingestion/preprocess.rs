//! Cleaning, validation, fingerprinting, and dedup of one file's raw chunks.

use std::collections::HashSet;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::cleaner::clean_text;
use super::hasher::content_hash;
use super::types::{
    ChunkMetadata, PreprocessStats, ProcessedChunk, RESERVED_METADATA_KEYS, RawChunk,
};
use super::validator::ChunkValidator;

/// Turns raw chunks into indexable [`ProcessedChunk`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentPreprocessor {
    validator: ChunkValidator,
}

impl DocumentPreprocessor {
    /// Build a preprocessor around `validator`.
    pub fn new(validator: ChunkValidator) -> Self {
        Self { validator }
    }

    /// Clean, validate, fingerprint, and dedup `chunks` from the file `filename`.
    ///
    /// Output order follows input order with rejected and duplicate chunks removed. Every
    /// surviving chunk shares one `indexedAt` timestamp taken when the call starts.
    pub fn preprocess(
        &self,
        chunks: Vec<RawChunk>,
        filename: &str,
        title: &str,
    ) -> (Vec<ProcessedChunk>, PreprocessStats) {
        let original = chunks.len();
        let indexed_at = current_timestamp_rfc3339();
        let mut accepted = Vec::with_capacity(original);
        let mut skipped_invalid = 0;

        for (position, chunk) in chunks.into_iter().enumerate() {
            let RawChunk {
                text,
                mut source_metadata,
            } = chunk;
            let cleaned = clean_text(Some(&text));

            if let Err(reason) = self.validator.validate(&cleaned) {
                skipped_invalid += 1;
                tracing::debug!(
                    filename,
                    chunk = position + 1,
                    reason = %reason,
                    "Skipped chunk: too short or low quality"
                );
                continue;
            }

            source_metadata.retain(|key, _| !RESERVED_METADATA_KEYS.contains(&key.as_str()));
            let metadata = ChunkMetadata {
                filename: filename.to_string(),
                title: title.to_string(),
                content_hash: content_hash(&cleaned),
                indexed_at: indexed_at.clone(),
                source: source_metadata,
            };
            accepted.push(ProcessedChunk::new(cleaned, metadata));
        }

        let (unique, duplicates_removed) = remove_duplicate_chunks(accepted);
        tracing::info!(
            filename,
            original,
            processed = unique.len(),
            skipped_invalid,
            duplicates_removed,
            "Preprocessed chunks"
        );

        (
            unique,
            PreprocessStats {
                original,
                skipped_invalid,
                duplicates_removed,
            },
        )
    }
}

/// Keep the first chunk seen for each content hash, preserving order.
pub fn remove_duplicate_chunks(chunks: Vec<ProcessedChunk>) -> (Vec<ProcessedChunk>, usize) {
    let mut seen = HashSet::new();
    let total = chunks.len();
    let unique: Vec<ProcessedChunk> = chunks
        .into_iter()
        .filter(|chunk| seen.insert(chunk.content_hash().to_string()))
        .collect();
    let removed = total - unique.len();
    (unique, removed)
}

/// Derive a document title from its file name: the name without extension, trimmed.
pub fn title_from_filename(filename: &str) -> String {
    let trimmed = filename.trim();
    std::path::Path::new(trimmed)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
