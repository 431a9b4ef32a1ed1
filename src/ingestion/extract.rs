//! Extraction of page text from source files, followed by splitting into raw chunks.

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::splitter::TextSplitter;
use super::types::{ExtractionError, RawChunk};

/// Turns the bytes of one source file into ordered raw chunks.
///
/// Implementations must be deterministic: identical bytes produce identical chunks.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Extract text from `bytes` and split it into chunks carrying page metadata.
    async fn extract_and_split(&self, bytes: Vec<u8>) -> Result<Vec<RawChunk>, ExtractionError>;
}

/// PDF extractor backed by `pdf-extract`, splitting page by page.
#[derive(Debug, Clone, Default)]
pub struct PdfExtractor {
    splitter: TextSplitter,
}

impl PdfExtractor {
    /// Build an extractor that splits pages with `splitter`.
    pub fn new(splitter: TextSplitter) -> Self {
        Self { splitter }
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract_and_split(&self, bytes: Vec<u8>) -> Result<Vec<RawChunk>, ExtractionError> {
        let splitter = self.splitter.clone();
        tokio::task::spawn_blocking(move || {
            let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes)
                .map_err(|error| ExtractionError::Pdf(error.to_string()))?;
            tracing::debug!(pages = pages.len(), "Extracted PDF pages");
            Ok(split_pages(&splitter, &pages))
        })
        .await?
    }
}

/// Split extracted pages, tagging each chunk with its 1-based page number.
pub fn split_pages(splitter: &TextSplitter, pages: &[String]) -> Vec<RawChunk> {
    let total_pages = pages.len();
    pages
        .iter()
        .enumerate()
        .flat_map(|(index, page)| {
            let mut metadata = Map::new();
            metadata.insert("page_number".into(), Value::from(index + 1));
            metadata.insert("total_pages".into(), Value::from(total_pages));
            splitter.split_into_chunks(page, &metadata)
        })
        .collect()
}
