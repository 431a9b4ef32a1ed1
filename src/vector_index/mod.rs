//! Vector index abstraction and its Qdrant implementation.

use async_trait::async_trait;

use crate::ingestion::ProcessedChunk;

pub mod client;
pub mod payload;
pub mod types;

pub use client::{QdrantIndex, QdrantSettings};
pub use types::{RetrievedDocument, VectorIndexError};

/// Store that embeds and persists chunks and answers similarity queries.
///
/// Shared between the ingestion pipeline and the reply flow.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Name of the index this handle writes to.
    fn index_name(&self) -> &str;

    /// Embed and store `chunks` as one write. Either the whole batch succeeds or the call errors.
    async fn add_documents(&self, chunks: &[ProcessedChunk]) -> Result<(), VectorIndexError>;

    /// Drop the index called `name` together with everything stored in it.
    async fn delete_index(&self, name: &str) -> Result<(), VectorIndexError>;

    /// Return up to `k` stored documents most similar to `query`, best match first.
    async fn similarity_search(
        &self,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedDocument>, VectorIndexError>;
}
