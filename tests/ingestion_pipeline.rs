use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use httpmock::{Method::DELETE, Method::GET, Method::PUT, MockServer};
use pdfrag::embedding::HashedEmbeddingClient;
use pdfrag::ingestion::{
    BatchIndexer, DocumentExtractor, DocumentPreprocessor, ExtractionError, IndexerSettings,
    IngestionCoordinator, IngestionError, ProcessedChunk, RawChunk, SplitterConfig, TextSplitter,
};
use pdfrag::metrics::IngestionMetrics;
use pdfrag::vector_index::{
    QdrantIndex, QdrantSettings, RetrievedDocument, VectorIndex, VectorIndexError,
};
use reqwest::StatusCode;
use serde_json::{Map, Value, json};
use std::time::Duration;
use tempfile::TempDir;

const SENTENCES: [&str; 4] = [
    "Photovoltaic modules convert incoming sunlight directly into direct current electricity on every rooftop.",
    "String inverters then transform that direct current into grid compatible alternating current for homes.",
    "Battery storage systems shift surplus midday solar generation into the busy evening demand peak hours.",
    "Net metering agreements credit households for the surplus energy they export back to the public grid.",
];

/// Treats file bytes as UTF-8 text, one page per form feed; files starting with `BROKEN` fail.
struct TextExtractor {
    splitter: TextSplitter,
}

impl TextExtractor {
    fn new() -> Self {
        Self {
            splitter: TextSplitter::new(SplitterConfig {
                chunk_size: 120,
                chunk_overlap: 0,
                ..SplitterConfig::default()
            }),
        }
    }
}

#[async_trait]
impl DocumentExtractor for TextExtractor {
    async fn extract_and_split(&self, bytes: Vec<u8>) -> Result<Vec<RawChunk>, ExtractionError> {
        let text = String::from_utf8_lossy(&bytes);
        if text.starts_with("BROKEN") {
            return Err(ExtractionError::Pdf("unsupported encryption".into()));
        }
        let mut chunks = Vec::new();
        for (index, page) in text.split('\u{c}').enumerate() {
            let mut metadata = Map::new();
            metadata.insert("page_number".into(), Value::from(index + 1));
            chunks.extend(self.splitter.split_into_chunks(page, &metadata));
        }
        Ok(chunks)
    }
}

#[derive(Default)]
struct RecordingIndex {
    batches: Mutex<Vec<Vec<ProcessedChunk>>>,
    deletes: Mutex<Vec<String>>,
    fail_delete: bool,
}

#[async_trait]
impl VectorIndex for RecordingIndex {
    fn index_name(&self) -> &str {
        "pdf-docs"
    }

    async fn add_documents(&self, chunks: &[ProcessedChunk]) -> Result<(), VectorIndexError> {
        self.batches.lock().unwrap().push(chunks.to_vec());
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<(), VectorIndexError> {
        self.deletes.lock().unwrap().push(name.to_string());
        if self.fail_delete {
            return Err(VectorIndexError::UnexpectedStatus {
                status: StatusCode::FORBIDDEN,
                body: "forbidden".into(),
            });
        }
        Ok(())
    }

    async fn similarity_search(
        &self,
        _query: &str,
        _k: usize,
    ) -> Result<Vec<RetrievedDocument>, VectorIndexError> {
        Ok(Vec::new())
    }
}

fn coordinator(index: Arc<dyn VectorIndex>, batch_size: usize) -> IngestionCoordinator {
    IngestionCoordinator::new(
        Arc::new(TextExtractor::new()),
        index,
        DocumentPreprocessor::default(),
        BatchIndexer::new(IndexerSettings {
            batch_size,
            pause: Duration::ZERO,
            ..IndexerSettings::default()
        }),
    )
}

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).expect("write fixture");
}

fn document() -> String {
    SENTENCES.join("\n\n")
}

#[tokio::test]
async fn ingests_pdfs_in_name_order_and_skips_other_entries() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "b-storage.pdf", &document());
    write(dir.path(), "a-panels.PDF", &document());
    write(dir.path(), "notes.txt", &document());
    std::fs::create_dir(dir.path().join("nested")).unwrap();
    write(&dir.path().join("nested"), "hidden.pdf", &document());

    let index = Arc::new(RecordingIndex::default());
    let metrics = Arc::new(IngestionMetrics::new());
    let summary = coordinator(index.clone(), 25)
        .with_metrics(metrics.clone())
        .run(dir.path(), false)
        .await
        .expect("run");

    let names: Vec<&str> = summary.files.iter().map(|f| f.filename.as_str()).collect();
    assert_eq!(names, vec!["a-panels.PDF", "b-storage.pdf"]);
    assert_eq!(summary.skipped_entries, 2);
    assert!(summary.failures.is_empty());
    assert_eq!(summary.chunks_indexed(), 8);

    let batches = index.batches.lock().unwrap();
    assert_eq!(batches.len(), 2);
    let first = &batches[0][0];
    assert_eq!(first.text(), SENTENCES[0]);
    assert_eq!(first.metadata().filename, "a-panels.PDF");
    assert_eq!(first.metadata().title, "a-panels");
    assert_eq!(first.metadata().source["page_number"], 1);

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.files_ingested, 2);
    assert_eq!(snapshot.chunks_indexed, 8);
}

#[tokio::test]
async fn duplicate_and_junk_chunks_never_reach_the_index() {
    let dir = TempDir::new().unwrap();
    let junk = "#".repeat(110);
    let text = [SENTENCES[0], SENTENCES[1], "42", SENTENCES[0], junk.as_str()].join("\u{c}");
    write(dir.path(), "doc.pdf", &text);

    let index = Arc::new(RecordingIndex::default());
    let summary = coordinator(index.clone(), 25)
        .run(dir.path(), false)
        .await
        .expect("run");

    let report = &summary.files[0];
    assert_eq!(report.original_chunks, 5);
    assert_eq!(report.skipped_invalid, 2);
    assert_eq!(report.duplicates_removed, 1);
    assert_eq!(report.processed_chunks, 2);

    let texts: Vec<String> = index.batches.lock().unwrap()[0]
        .iter()
        .map(|chunk| chunk.text().to_string())
        .collect();
    assert_eq!(texts, vec![SENTENCES[0], SENTENCES[1]]);
}

#[tokio::test]
async fn failing_file_is_reported_and_run_continues() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.pdf", "BROKEN file");
    write(dir.path(), "b.pdf", &document());

    let index = Arc::new(RecordingIndex::default());
    let metrics = Arc::new(IngestionMetrics::new());
    let summary = coordinator(index, 25)
        .with_metrics(metrics.clone())
        .run(dir.path(), false)
        .await
        .expect("run");

    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].filename, "a.pdf");
    assert!(summary.failures[0].error.contains("unsupported encryption"));
    assert_eq!(summary.files.len(), 1);
    assert_eq!(metrics.snapshot().files_failed, 1);
}

#[tokio::test]
async fn missing_directory_is_fatal() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist");

    let error = coordinator(Arc::new(RecordingIndex::default()), 25)
        .run(&missing, false)
        .await
        .expect_err("missing directory");
    assert!(matches!(error, IngestionError::SourceDirectory { .. }));
}

#[tokio::test]
async fn failed_index_deletion_does_not_stop_the_run() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "doc.pdf", &document());

    let index = Arc::new(RecordingIndex {
        fail_delete: true,
        ..RecordingIndex::default()
    });
    let summary = coordinator(index.clone(), 25)
        .run(dir.path(), true)
        .await
        .expect("run");

    assert_eq!(*index.deletes.lock().unwrap(), vec!["pdf-docs".to_string()]);
    assert_eq!(summary.chunks_indexed(), 4);
}

#[tokio::test]
async fn empty_directory_yields_empty_summary() {
    let dir = TempDir::new().unwrap();
    let summary = coordinator(Arc::new(RecordingIndex::default()), 25)
        .run(dir.path(), false)
        .await
        .expect("run");
    assert!(summary.files.is_empty());
    assert_eq!(summary.skipped_entries, 0);
}

#[tokio::test]
async fn qdrant_backend_receives_batched_points() {
    let server = MockServer::start_async().await;
    let delete = server
        .mock_async(|when, then| {
            when.method(DELETE).path("/collections/pdf-docs");
            then.status(200).json_body(json!({ "result": true }));
        })
        .await;
    let exists = server
        .mock_async(|when, then| {
            when.method(GET).path("/collections/pdf-docs");
            then.status(404);
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(PUT).path("/collections/pdf-docs");
            then.status(200).json_body(json!({ "result": true }));
        })
        .await;
    let upsert = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/collections/pdf-docs/points")
                .body_contains("\"title\":\"solar\"");
            then.status(200)
                .json_body(json!({ "result": { "status": "completed" } }));
        })
        .await;

    let index = QdrantIndex::new(
        QdrantSettings {
            url: server.base_url(),
            collection: "pdf-docs".into(),
            api_key: None,
            vector_size: 16,
        },
        Arc::new(HashedEmbeddingClient::new(16)),
    )
    .expect("index");

    let dir = TempDir::new().unwrap();
    write(dir.path(), "solar.pdf", &document());
    let summary = coordinator(Arc::new(index), 3)
        .run(dir.path(), true)
        .await
        .expect("run");

    delete.assert();
    exists.assert_hits(1);
    create.assert_hits(1);
    upsert.assert_hits(2);
    assert_eq!(summary.files[0].indexing.batches_total, 2);
    assert_eq!(summary.files[0].indexing.batches_indexed, 2);
}
