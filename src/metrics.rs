use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::ingestion::FileReport;

/// Thread-safe counters describing ingestion activity.
#[derive(Default)]
pub struct IngestionMetrics {
    files_ingested: AtomicU64,
    files_failed: AtomicU64,
    chunks_indexed: AtomicU64,
    batches_abandoned: AtomicU64,
}

impl IngestionMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a processed file and what its batches achieved.
    pub fn record_file(&self, report: &FileReport) {
        self.files_ingested.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed
            .fetch_add(report.indexing.chunks_indexed as u64, Ordering::Relaxed);
        self.batches_abandoned
            .fetch_add(report.indexing.batches_abandoned as u64, Ordering::Relaxed);
    }

    /// Record a file that could not be processed.
    pub fn record_failure(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            files_ingested: self.files_ingested.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            batches_abandoned: self.batches_abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of ingestion counters used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Files processed since startup.
    pub files_ingested: u64,
    /// Files that failed to process.
    pub files_failed: u64,
    /// Chunks written to the vector index.
    pub chunks_indexed: u64,
    /// Batches given up on after exhausting their retries.
    pub batches_abandoned: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::IndexingReport;
    use std::time::Duration;

    fn report(chunks_indexed: usize, batches_abandoned: usize) -> FileReport {
        FileReport {
            filename: "a.pdf".into(),
            title: "a".into(),
            original_chunks: chunks_indexed,
            processed_chunks: chunks_indexed,
            skipped_invalid: 0,
            duplicates_removed: 0,
            indexing: IndexingReport {
                chunks_indexed,
                batches_abandoned,
                ..IndexingReport::default()
            },
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn records_files_and_chunks() {
        let metrics = IngestionMetrics::new();
        metrics.record_file(&report(2, 0));
        metrics.record_file(&report(3, 1));
        metrics.record_failure();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.files_ingested, 2);
        assert_eq!(snapshot.chunks_indexed, 5);
        assert_eq!(snapshot.batches_abandoned, 1);
        assert_eq!(snapshot.files_failed, 1);
    }

    #[test]
    fn snapshot_starts_empty() {
        let snapshot = IngestionMetrics::new().snapshot();
        assert_eq!(snapshot.files_ingested, 0);
        assert_eq!(snapshot.chunks_indexed, 0);
    }
}
