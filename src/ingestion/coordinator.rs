//! Directory-level ingestion: discover PDFs and run each one through the pipeline.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use walkdir::WalkDir;

use super::extract::DocumentExtractor;
use super::indexer::BatchIndexer;
use super::preprocess::{DocumentPreprocessor, title_from_filename};
use super::types::{FileFailure, FileReport, IngestionError, IngestionSummary};
use crate::metrics::IngestionMetrics;
use crate::vector_index::VectorIndex;

/// Drives ingestion runs over a flat directory of PDF files.
pub struct IngestionCoordinator {
    extractor: Arc<dyn DocumentExtractor>,
    index: Arc<dyn VectorIndex>,
    preprocessor: DocumentPreprocessor,
    indexer: BatchIndexer,
    metrics: Option<Arc<IngestionMetrics>>,
}

impl IngestionCoordinator {
    /// Build a coordinator from its collaborators.
    pub fn new(
        extractor: Arc<dyn DocumentExtractor>,
        index: Arc<dyn VectorIndex>,
        preprocessor: DocumentPreprocessor,
        indexer: BatchIndexer,
    ) -> Self {
        Self {
            extractor,
            index,
            preprocessor,
            indexer,
            metrics: None,
        }
    }

    /// Record per-file outcomes into `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<IngestionMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Ingest every `.pdf` directly inside `dir`, in file name order.
    ///
    /// When `delete_index` is set the index is dropped first; failure to drop it is logged and
    /// ignored. Subdirectories and other files are skipped. A file that fails is recorded in the
    /// summary and the run continues; only an unreadable `dir` aborts the run.
    pub async fn run(
        &self,
        dir: &Path,
        delete_index: bool,
    ) -> Result<IngestionSummary, IngestionError> {
        let started = Instant::now();
        tracing::info!(dir = %dir.display(), delete_index, "Starting ingestion run");

        if delete_index {
            let name = self.index.index_name().to_string();
            match self.index.delete_index(&name).await {
                Ok(()) => tracing::info!(index = %name, "Deleted existing index"),
                Err(error) => tracing::warn!(
                    index = %name,
                    error = %error,
                    "Failed to delete index; continuing"
                ),
            }
        }

        let mut summary = IngestionSummary::default();
        for entry in WalkDir::new(dir)
            .min_depth(0)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(error) if error.depth() == 0 => {
                    return Err(IngestionError::SourceDirectory {
                        path: dir.display().to_string(),
                        source: error,
                    });
                }
                Err(error) => {
                    tracing::warn!(error = %error, "Skipping unreadable directory entry");
                    summary.skipped_entries += 1;
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }
            if !entry.file_type().is_file() || !is_pdf(entry.path()) {
                tracing::debug!(path = %entry.path().display(), "Skipping non-PDF entry");
                summary.skipped_entries += 1;
                continue;
            }

            let filename = entry.file_name().to_string_lossy().into_owned();
            match self.ingest_file(entry.path()).await {
                Ok(report) => {
                    if let Some(metrics) = &self.metrics {
                        metrics.record_file(&report);
                    }
                    summary.files.push(report);
                }
                Err(error) => {
                    tracing::error!(filename = %filename, error = %error, "Failed to ingest file");
                    if let Some(metrics) = &self.metrics {
                        metrics.record_failure();
                    }
                    summary.failures.push(FileFailure {
                        filename,
                        error: error.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            files = summary.files.len(),
            failures = summary.failures.len(),
            skipped = summary.skipped_entries,
            chunks_indexed = summary.chunks_indexed(),
            batches_abandoned = summary.batches_abandoned(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Ingestion run finished"
        );
        Ok(summary)
    }

    /// Extract, preprocess, and index one file.
    pub async fn ingest_file(&self, path: &Path) -> Result<FileReport, IngestionError> {
        let started = Instant::now();
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let title = title_from_filename(&filename);
        tracing::info!(filename = %filename, "Processing file");

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| IngestionError::Read {
                path: path.display().to_string(),
                source,
            })?;
        let raw_chunks = self
            .extractor
            .extract_and_split(bytes)
            .await
            .map_err(|source| IngestionError::Extraction {
                filename: filename.clone(),
                source,
            })?;

        let (chunks, stats) = self.preprocessor.preprocess(raw_chunks, &filename, &title);
        let indexing = self.indexer.index(&chunks, self.index.as_ref()).await;

        let report = FileReport {
            filename,
            title,
            original_chunks: stats.original,
            processed_chunks: chunks.len(),
            skipped_invalid: stats.skipped_invalid,
            duplicates_removed: stats.duplicates_removed,
            indexing,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            filename = %report.filename,
            original = report.original_chunks,
            processed = report.processed_chunks,
            indexed = report.indexing.chunks_indexed,
            abandoned_batches = report.indexing.batches_abandoned,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Processed file"
        );
        Ok(report)
    }
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}
