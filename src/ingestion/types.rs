//! Chunk records and error definitions shared by the ingestion pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use thiserror::Error;

use crate::vector_index::VectorIndexError;

/// Span of text produced by the splitter, not yet cleaned or validated.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawChunk {
    /// Text exactly as the splitter produced it.
    pub text: String,
    /// Page and source details supplied by the extractor.
    pub source_metadata: Map<String, Value>,
}

impl RawChunk {
    /// Build a raw chunk without source metadata.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source_metadata: Map::new(),
        }
    }
}

/// Keys owned by the pipeline; extractor metadata never overrides them.
pub const RESERVED_METADATA_KEYS: [&str; 4] = ["filename", "title", "contentHash", "indexedAt"];

/// Metadata attached to every processed chunk.
///
/// Source metadata from the extractor is flattened next to the pipeline fields. Source entries
/// named like a pipeline field are dropped on serialization, so the pipeline values win.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Base name of the source file.
    pub filename: String,
    /// File name without its extension.
    pub title: String,
    /// Fingerprint of the cleaned text.
    pub content_hash: String,
    /// RFC 3339 timestamp recorded when the chunk was preprocessed.
    pub indexed_at: String,
    /// Extractor-provided fields such as page numbers.
    #[serde(flatten)]
    pub source: Map<String, Value>,
}

impl Serialize for ChunkMetadata {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        for (key, value) in &self.source {
            if !RESERVED_METADATA_KEYS.contains(&key.as_str()) {
                map.serialize_entry(key, value)?;
            }
        }
        map.serialize_entry("filename", &self.filename)?;
        map.serialize_entry("title", &self.title)?;
        map.serialize_entry("contentHash", &self.content_hash)?;
        map.serialize_entry("indexedAt", &self.indexed_at)?;
        map.end()
    }
}

/// Cleaned, validated chunk ready for indexing.
///
/// Values are immutable once built: the preprocessor is the only producer and nothing downstream
/// rewrites text or metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedChunk {
    text: String,
    metadata: ChunkMetadata,
}

impl ProcessedChunk {
    /// Assemble a chunk from already-cleaned text and its metadata.
    pub fn new(text: String, metadata: ChunkMetadata) -> Self {
        Self { text, metadata }
    }

    /// Cleaned chunk text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Metadata attached during preprocessing.
    pub fn metadata(&self) -> &ChunkMetadata {
        &self.metadata
    }

    /// Fingerprint of the cleaned text.
    pub fn content_hash(&self) -> &str {
        &self.metadata.content_hash
    }
}

/// Counters reported by one preprocessing run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PreprocessStats {
    /// Raw chunks received from the splitter.
    pub original: usize,
    /// Chunks dropped by the validator.
    pub skipped_invalid: usize,
    /// Chunks dropped because an earlier chunk had the same fingerprint.
    pub duplicates_removed: usize,
}

/// Outcome of indexing one file's chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexingReport {
    /// Number of batches the chunks were partitioned into.
    pub batches_total: usize,
    /// Batches written successfully.
    pub batches_indexed: usize,
    /// Batches given up on after exhausting their attempts.
    pub batches_abandoned: usize,
    /// Chunks contained in successful batches.
    pub chunks_indexed: usize,
    /// Chunks contained in abandoned batches.
    pub chunks_abandoned: usize,
    /// Write attempts issued across all batches, failed ones included.
    pub attempts: usize,
}

/// Per-file statistics produced by the coordinator.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// Base name of the ingested file.
    pub filename: String,
    /// Title derived from the file name.
    pub title: String,
    /// Chunks produced by the splitter.
    pub original_chunks: usize,
    /// Chunks that survived cleaning, validation, and dedup.
    pub processed_chunks: usize,
    /// Chunks rejected by the validator.
    pub skipped_invalid: usize,
    /// Duplicate chunks removed.
    pub duplicates_removed: usize,
    /// Batch indexing outcome.
    pub indexing: IndexingReport,
    /// Wall-clock processing time.
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

/// File that could not be ingested.
#[derive(Debug, Clone, Serialize)]
pub struct FileFailure {
    /// Base name of the failing file.
    pub filename: String,
    /// Rendered error.
    pub error: String,
}

/// Result of one ingestion run over a source directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestionSummary {
    /// Successfully processed files, in processing order.
    pub files: Vec<FileReport>,
    /// Files whose processing failed.
    pub failures: Vec<FileFailure>,
    /// Directory entries ignored because they are not PDFs.
    pub skipped_entries: usize,
}

impl IngestionSummary {
    /// Total chunks written to the vector index during the run.
    pub fn chunks_indexed(&self) -> usize {
        self.files
            .iter()
            .map(|file| file.indexing.chunks_indexed)
            .sum()
    }

    /// Total batches abandoned during the run.
    pub fn batches_abandoned(&self) -> usize {
        self.files
            .iter()
            .map(|file| file.indexing.batches_abandoned)
            .sum()
    }
}

fn serialize_millis<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u128(value.as_millis())
}

/// Errors raised while turning file bytes into raw chunks.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The PDF parser rejected the document.
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    /// The blocking extraction task did not complete.
    #[error("extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Reason a batch failed its pre-write check.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchValidationError {
    /// Chunk text is empty or below the minimum batch length.
    #[error("Invalid document at index {index}: content too short")]
    ContentTooShort {
        /// Position of the offending chunk inside the batch.
        index: usize,
    },
    /// Chunk metadata lacks a filename.
    #[error("Invalid document at index {index}: missing metadata")]
    MissingMetadata {
        /// Position of the offending chunk inside the batch.
        index: usize,
    },
}

/// Errors surfaced by a single batch attempt.
#[derive(Debug, Error)]
pub enum BatchError {
    /// Batch failed validation before reaching the index.
    #[error(transparent)]
    Validation(#[from] BatchValidationError),
    /// Vector index rejected the write.
    #[error(transparent)]
    Index(#[from] VectorIndexError),
}

/// Errors emitted by the ingestion coordinator.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Source directory is missing or unreadable; fatal for the run.
    #[error("Cannot read source directory {path}: {source}")]
    SourceDirectory {
        /// Directory that was scanned.
        path: String,
        /// Underlying walk error.
        #[source]
        source: walkdir::Error,
    },
    /// Source file could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// File that failed.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Extraction or splitting failed for a file.
    #[error("Failed to extract {filename}: {source}")]
    Extraction {
        /// File that failed.
        filename: String,
        /// Underlying extraction error.
        #[source]
        source: ExtractionError,
    },
}
