//! Batched writes of processed chunks with a bounded retry loop.

use std::time::{Duration, Instant};

use super::types::{BatchError, BatchValidationError, IndexingReport, ProcessedChunk};
use crate::vector_index::VectorIndex;

/// Sizing and retry settings for [`BatchIndexer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexerSettings {
    /// Maximum chunks per write.
    pub batch_size: usize,
    /// Total attempts per batch, the first one included.
    pub max_retries: u32,
    /// Pause after each successful batch.
    pub pause: Duration,
    /// Minimum chunk length accepted by the pre-write batch check.
    pub min_chunk_length: usize,
}

impl Default for IndexerSettings {
    fn default() -> Self {
        Self {
            batch_size: 25,
            max_retries: 3,
            pause: Duration::from_millis(100),
            min_chunk_length: 50,
        }
    }
}

/// Writes chunks to a [`VectorIndex`] in fixed-size batches.
///
/// Each batch is checked and written up to `max_retries` times, immediately one after the other.
/// A batch that fails every attempt is abandoned and the indexer moves on to the next one.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchIndexer {
    settings: IndexerSettings,
}

impl BatchIndexer {
    /// Build an indexer with `settings`; zero sizes are raised to one.
    pub fn new(settings: IndexerSettings) -> Self {
        Self {
            settings: IndexerSettings {
                batch_size: settings.batch_size.max(1),
                max_retries: settings.max_retries.max(1),
                ..settings
            },
        }
    }

    /// Settings in effect.
    pub fn settings(&self) -> IndexerSettings {
        self.settings
    }

    /// Write `chunks` to `index` in order, reporting which batches landed.
    pub async fn index(
        &self,
        chunks: &[ProcessedChunk],
        index: &dyn VectorIndex,
    ) -> IndexingReport {
        let batch_size = self.settings.batch_size;
        let batches_total = chunks.len().div_ceil(batch_size);
        let mut report = IndexingReport {
            batches_total,
            ..IndexingReport::default()
        };
        tracing::info!(
            documents = chunks.len(),
            batch_size,
            batches = batches_total,
            index = index.index_name(),
            "Starting batch indexing"
        );

        for (position, batch) in chunks.chunks(batch_size).enumerate() {
            let batch_number = position + 1;
            tracing::debug!(
                batch = batch_number,
                batches = batches_total,
                size = batch.len(),
                "Processing batch"
            );

            let mut indexed = false;
            for attempt in 1..=self.settings.max_retries {
                report.attempts += 1;
                let started = Instant::now();
                match self.write_batch(batch, index).await {
                    Ok(()) => {
                        tracing::info!(
                            batch = batch_number,
                            batches = batches_total,
                            attempt,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Indexed batch"
                        );
                        indexed = true;
                        break;
                    }
                    Err(error) => tracing::warn!(
                        batch = batch_number,
                        attempt,
                        max_attempts = self.settings.max_retries,
                        error = %error,
                        "Batch attempt failed"
                    ),
                }
            }

            if indexed {
                report.batches_indexed += 1;
                report.chunks_indexed += batch.len();
                tokio::time::sleep(self.settings.pause).await;
            } else {
                report.batches_abandoned += 1;
                report.chunks_abandoned += batch.len();
                tracing::error!(
                    batch = batch_number,
                    chunks = batch.len(),
                    attempts = self.settings.max_retries,
                    "Abandoned batch after exhausting retries"
                );
            }
        }

        tracing::info!(
            indexed = report.chunks_indexed,
            abandoned = report.chunks_abandoned,
            "Finished batch indexing"
        );
        report
    }

    async fn write_batch(
        &self,
        batch: &[ProcessedChunk],
        index: &dyn VectorIndex,
    ) -> Result<(), BatchError> {
        validate_batch(batch, self.settings.min_chunk_length)?;
        index.add_documents(batch).await?;
        Ok(())
    }
}

/// Check every chunk in `batch` has at least `min_length` characters and a filename.
pub fn validate_batch(
    batch: &[ProcessedChunk],
    min_length: usize,
) -> Result<(), BatchValidationError> {
    for (index, chunk) in batch.iter().enumerate() {
        if chunk.text().chars().count() < min_length {
            return Err(BatchValidationError::ContentTooShort { index });
        }
        if chunk.metadata().filename.trim().is_empty() {
            return Err(BatchValidationError::MissingMetadata { index });
        }
    }
    Ok(())
}
