//! PDF ingestion pipeline.
//!
//! Each file flows through extraction and splitting ([`extract`], [`splitter`]), then cleaning,
//! validation, fingerprinting, and dedup ([`preprocess`]), and finally batched writes into the
//! vector index ([`indexer`]). [`coordinator`] walks the source directory and ties the stages
//! together, one file at a time.

pub mod cleaner;
pub mod coordinator;
pub mod extract;
pub mod hasher;
pub mod indexer;
pub mod preprocess;
pub mod splitter;
pub mod types;
pub mod validator;

pub use cleaner::clean_text;
pub use coordinator::IngestionCoordinator;
pub use extract::{DocumentExtractor, PdfExtractor};
pub use hasher::content_hash;
pub use indexer::{BatchIndexer, IndexerSettings, validate_batch};
pub use preprocess::{DocumentPreprocessor, remove_duplicate_chunks, title_from_filename};
pub use splitter::{SplitterConfig, TextSplitter};
pub use types::{
    BatchError, BatchValidationError, ChunkMetadata, ExtractionError, FileFailure, FileReport,
    IndexingReport, IngestionError, IngestionSummary, PreprocessStats, ProcessedChunk, RawChunk,
};
pub use validator::{ChunkRejection, ChunkValidator, ValidationThresholds};
