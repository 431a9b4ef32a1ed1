//! Qdrant-backed implementation of [`VectorIndex`].

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::VectorIndex;
use super::payload::{build_payload, generate_point_id, parse_point};
use super::types::{QueryResponse, QueryResponseResult, RetrievedDocument, VectorIndexError};
use crate::config::Config;
use crate::embedding::EmbeddingClient;
use crate::ingestion::ProcessedChunk;

/// Connection settings for [`QdrantIndex`].
#[derive(Debug, Clone)]
pub struct QdrantSettings {
    /// Base URL of the Qdrant REST API.
    pub url: String,
    /// Collection acting as the index.
    pub collection: String,
    /// Optional API key sent in the `api-key` header.
    pub api_key: Option<String>,
    /// Vector size used when the collection has to be created.
    pub vector_size: u64,
}

impl QdrantSettings {
    /// Settings taken from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.qdrant_url.clone(),
            collection: config.qdrant_collection_name.clone(),
            api_key: config.qdrant_api_key.clone(),
            vector_size: config.embedding_dimension as u64,
        }
    }
}

/// Vector index stored in a single Qdrant collection.
///
/// The collection is created on the first write when missing; deleting it resets that state so
/// the next write recreates it.
pub struct QdrantIndex {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    collection: String,
    vector_size: u64,
    embedder: Arc<dyn EmbeddingClient>,
    collection_ready: AtomicBool,
}

impl QdrantIndex {
    /// Construct a new index client.
    pub fn new(
        settings: QdrantSettings,
        embedder: Arc<dyn EmbeddingClient>,
    ) -> Result<Self, VectorIndexError> {
        let client = Client::builder().user_agent("pdfrag/0.1").build()?;
        let base_url = normalize_base_url(&settings.url).map_err(VectorIndexError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            collection = %settings.collection,
            has_api_key = settings
                .api_key
                .as_deref()
                .is_some_and(|value| !value.is_empty()),
            "Initialized Qdrant HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            api_key: settings.api_key,
            collection: settings.collection,
            vector_size: settings.vector_size,
            embedder,
            collection_ready: AtomicBool::new(false),
        })
    }

    async fn ensure_collection(&self) -> Result<(), VectorIndexError> {
        if self.collection_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        if !self.collection_exists(&self.collection).await? {
            tracing::info!(
                collection = %self.collection,
                vector_size = self.vector_size,
                "Creating collection"
            );
            self.create_collection(&self.collection, self.vector_size)
                .await?;
        }
        self.collection_ready.store(true, Ordering::Release);
        Ok(())
    }

    async fn create_collection(
        &self,
        collection_name: &str,
        vector_size: u64,
    ) -> Result<(), VectorIndexError> {
        let body = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        let response = self
            .request(Method::PUT, &format!("collections/{collection_name}"))
            .json(&body)
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(collection = collection_name, "Collection created");
        })
        .await
    }

    async fn collection_exists(&self, collection_name: &str) -> Result<bool, VectorIndexError> {
        let response = self
            .request(Method::GET, &format!("collections/{collection_name}"))
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = VectorIndexError::UnexpectedStatus { status, body };
                tracing::error!(
                    collection = collection_name,
                    error = %error,
                    "Collection existence check failed"
                );
                Err(error)
            }
        }
    }

    async fn embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, VectorIndexError> {
        let expected = texts.len();
        let vectors = self.embedder.generate_embeddings(texts).await?;
        if vectors.len() != expected {
            return Err(VectorIndexError::EmbeddingCountMismatch {
                expected,
                received: vectors.len(),
            });
        }
        Ok(vectors)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self.client.request(method, url);
        if let Some(api_key) = &self.api_key
            && !api_key.is_empty()
        {
            req = req.header("api-key", api_key);
        }
        req
    }

    async fn ensure_success<F>(
        &self,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<(), VectorIndexError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorIndexError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Qdrant request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    fn index_name(&self) -> &str {
        &self.collection
    }

    async fn add_documents(&self, chunks: &[ProcessedChunk]) -> Result<(), VectorIndexError> {
        if chunks.is_empty() {
            return Ok(());
        }
        self.ensure_collection().await?;

        let texts = chunks
            .iter()
            .map(|chunk| chunk.text().to_string())
            .collect();
        let vectors = self.embed(texts).await?;
        let points: Vec<Value> = chunks
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                json!({
                    "id": generate_point_id(),
                    "vector": vector,
                    "payload": build_payload(chunk),
                })
            })
            .collect();

        let point_count = points.len();
        let response = self
            .request(
                Method::PUT,
                &format!("collections/{}/points", self.collection),
            )
            .query(&[("wait", true)])
            .json(&json!({ "points": points }))
            .send()
            .await?;

        self.ensure_success(response, || {
            tracing::debug!(
                collection = %self.collection,
                points = point_count,
                "Points indexed"
            );
        })
        .await
    }

    async fn delete_index(&self, name: &str) -> Result<(), VectorIndexError> {
        let response = self
            .request(Method::DELETE, &format!("collections/{name}"))
            .send()
            .await?;

        if name == self.collection {
            self.collection_ready.store(false, Ordering::Release);
        }

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(collection = name, "Collection already absent");
            return Ok(());
        }
        self.ensure_success(response, || {
            tracing::info!(collection = name, "Collection deleted");
        })
        .await
    }

    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedDocument>, VectorIndexError> {
        let vector = self
            .embed(vec![query.to_string()])
            .await?
            .pop()
            .unwrap_or_default();

        let body = json!({
            "query": vector,
            "limit": k,
            "with_payload": true,
        });

        let response = self
            .request(
                Method::POST,
                &format!("collections/{}/points/query", self.collection),
            )
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = VectorIndexError::UnexpectedStatus { status, body };
            tracing::error!(collection = %self.collection, error = %error, "Qdrant search failed");
            return Err(error);
        }

        let payload: QueryResponse = response.json().await?;
        let points = match payload.result {
            QueryResponseResult::Points(points) => points,
            QueryResponseResult::Object { points } => points,
        };
        Ok(points.into_iter().filter_map(parse_point).collect())
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
