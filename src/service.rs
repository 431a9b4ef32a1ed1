//! Application service wiring ingestion and replies behind one handle.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::embedding::{EmbeddingClientError, build_embedding_client};
use crate::ingestion::{
    BatchIndexer, ChunkValidator, DocumentPreprocessor, IngestionCoordinator, IngestionError,
    IngestionSummary, PdfExtractor, TextSplitter,
};
use crate::llm::{LlmError, OpenAiChatModel};
use crate::metrics::{IngestionMetrics, MetricsSnapshot};
use crate::reply::{
    AllowAllModerator, ContentModerator, InMemorySessionStore, OpenAiModerator, ReplyError,
    ReplyRequest, ReplyResponse, ReplyService, ReplySettings,
};
use crate::vector_index::{QdrantIndex, QdrantSettings, VectorIndex, VectorIndexError};

/// Errors raised while assembling the service from configuration.
#[derive(Debug, Error)]
pub enum ServiceInitError {
    /// Embedding client could not be built.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Vector index client could not be built.
    #[error(transparent)]
    VectorIndex(#[from] VectorIndexError),
    /// Language model client could not be built.
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// Moderation client could not be built.
    #[error("Failed to build moderation client: {0}")]
    Moderation(#[from] reqwest::Error),
}

/// Operations exposed to the HTTP and CLI surfaces.
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Ingest the configured documents directory, optionally dropping the index first.
    async fn ingest(&self, delete_index: bool) -> Result<IngestionSummary, IngestionError>;

    /// Answer a user question.
    async fn reply(&self, request: ReplyRequest) -> Result<ReplyResponse, ReplyError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Shared application service. Construct once and share through an `Arc`.
///
/// Ingestion runs are serialized: a second request waits for the running one to finish.
pub struct RagService {
    coordinator: IngestionCoordinator,
    replies: ReplyService,
    documents_dir: PathBuf,
    metrics: Arc<IngestionMetrics>,
    ingest_lock: Mutex<()>,
}

impl RagService {
    /// Assemble the service from prebuilt parts.
    pub fn new(
        coordinator: IngestionCoordinator,
        replies: ReplyService,
        documents_dir: impl Into<PathBuf>,
        metrics: Arc<IngestionMetrics>,
    ) -> Self {
        Self {
            coordinator,
            replies,
            documents_dir: documents_dir.into(),
            metrics,
            ingest_lock: Mutex::new(()),
        }
    }

    /// Build every collaborator from configuration.
    pub fn from_config(config: &Config) -> Result<Self, ServiceInitError> {
        let metrics = Arc::new(IngestionMetrics::new());
        let index = build_vector_index(config)?;
        let coordinator = build_coordinator(config, index.clone()).with_metrics(metrics.clone());

        tracing::info!(model = %config.openai_model, "Initializing chat model");
        let llm = Arc::new(OpenAiChatModel::from_config(config)?);
        let moderator: Arc<dyn ContentModerator> = match &config.openai_api_key {
            Some(key) => {
                let moderator = OpenAiModerator::new(config.openai_base_url.clone(), key.clone())?;
                Arc::new(moderator)
            }
            None => {
                tracing::warn!("No OpenAI API key configured; moderation disabled");
                Arc::new(AllowAllModerator)
            }
        };
        let sessions = Arc::new(InMemorySessionStore::new(Duration::from_secs(
            config.session_ttl_secs,
        )));
        let replies = ReplyService::new(
            llm,
            index,
            moderator,
            sessions,
            ReplySettings::from_config(config),
        );

        Ok(Self::new(coordinator, replies, config.documents_dir.clone(), metrics))
    }

    /// Ingest `dir` instead of the configured directory.
    pub async fn ingest_dir(
        &self,
        dir: &Path,
        delete_index: bool,
    ) -> Result<IngestionSummary, IngestionError> {
        let _guard = self.ingest_lock.lock().await;
        self.coordinator.run(dir, delete_index).await
    }
}

#[async_trait]
impl RagApi for RagService {
    async fn ingest(&self, delete_index: bool) -> Result<IngestionSummary, IngestionError> {
        self.ingest_dir(&self.documents_dir, delete_index).await
    }

    async fn reply(&self, request: ReplyRequest) -> Result<ReplyResponse, ReplyError> {
        self.replies.generate_reply(request).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

/// Build the Qdrant-backed vector index with the configured embedding provider.
pub fn build_vector_index(config: &Config) -> Result<Arc<dyn VectorIndex>, ServiceInitError> {
    tracing::info!(provider = ?config.embedding_provider, "Initializing embedding client");
    let embedder = build_embedding_client(config)?;
    let index = QdrantIndex::new(QdrantSettings::from_config(config), embedder)?;
    Ok(Arc::new(index))
}

/// Build an ingestion coordinator writing to `index` with the configured pipeline settings.
pub fn build_coordinator(config: &Config, index: Arc<dyn VectorIndex>) -> IngestionCoordinator {
    let extractor = Arc::new(PdfExtractor::new(TextSplitter::new(config.splitter_config())));
    IngestionCoordinator::new(
        extractor,
        index,
        DocumentPreprocessor::new(ChunkValidator::new(config.validation_thresholds())),
        BatchIndexer::new(config.indexer_settings()),
    )
}
