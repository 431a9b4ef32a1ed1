//! Recursive character splitter turning page text into overlapping chunks.
//!
//! The splitter tries separators from coarse to fine (paragraph, line, sentence, clause, word).
//! It picks the first separator present in the text, splits on it, merges neighbouring pieces
//! back together up to `chunk_size` characters, and recurses with the finer separators on any
//! piece that is still too large. Merged chunks carry up to `chunk_overlap` characters of the
//! previous chunk. Separators are not kept and lengths are measured in characters.

use serde_json::{Map, Value};
use std::collections::VecDeque;

use super::types::RawChunk;

/// Separators tried in order when no custom list is configured.
pub const DEFAULT_SEPARATORS: [&str; 8] = ["\n\n", "\n", ". ", "! ", "? ", "; ", ", ", " "];

/// Sizing and separator configuration for [`TextSplitter`].
#[derive(Debug, Clone)]
pub struct SplitterConfig {
    /// Target maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters of trailing context repeated at the start of the next chunk.
    pub chunk_overlap: usize,
    /// Separators ordered from coarsest to finest.
    pub separators: Vec<String>,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
            separators: DEFAULT_SEPARATORS.map(String::from).to_vec(),
        }
    }
}

/// Recursive character splitter.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(SplitterConfig::default())
    }
}

impl TextSplitter {
    /// Build a splitter, clamping the overlap below the chunk size.
    pub fn new(config: SplitterConfig) -> Self {
        let chunk_size = config.chunk_size.max(1);
        let chunk_overlap = config.chunk_overlap.min(chunk_size - 1);
        if chunk_overlap != config.chunk_overlap {
            tracing::warn!(
                chunk_size,
                requested = config.chunk_overlap,
                chunk_overlap,
                "Chunk overlap clamped below chunk size"
            );
        }
        Self {
            chunk_size,
            chunk_overlap,
            separators: config.separators,
        }
    }

    /// Split `text` into chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split `text` and attach a copy of `metadata` to every resulting chunk.
    pub fn split_into_chunks(&self, text: &str, metadata: &Map<String, Value>) -> Vec<RawChunk> {
        self.split_text(text)
            .into_iter()
            .map(|text| RawChunk {
                text,
                source_metadata: metadata.clone(),
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or("");
        let mut finer: &[String] = &[];
        for (position, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate;
                finer = &separators[position + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in split_on(text, separator) {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge_splits(&pending, separator));
                pending.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge_splits(&pending, separator));
        }
        chunks
    }

    fn merge_splits(&self, splits: &[&str], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let joiner = |current: &VecDeque<&str>| {
            if current.is_empty() { 0 } else { separator_len }
        };

        let mut docs = Vec::new();
        let mut current: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for &piece in splits {
            let len = char_len(piece);
            if total + len + joiner(&current) > self.chunk_size {
                if total > self.chunk_size {
                    tracing::warn!(
                        total,
                        chunk_size = self.chunk_size,
                        "Created a chunk longer than the configured size"
                    );
                }
                if !current.is_empty() {
                    if let Some(doc) = join_pieces(&current, separator) {
                        docs.push(doc);
                    }
                    while total > self.chunk_overlap
                        || (total > 0 && total + len + joiner(&current) > self.chunk_size)
                    {
                        let Some(first) = current.pop_front() else {
                            break;
                        };
                        total = total.saturating_sub(char_len(first) + joiner(&current));
                    }
                }
            }
            current.push_back(piece);
            total += len + if current.len() > 1 { separator_len } else { 0 };
        }

        if let Some(doc) = join_pieces(&current, separator) {
            docs.push(doc);
        }
        docs
    }
}

fn split_on<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text.split_inclusive(|_: char| true).collect();
    }
    text.split(separator)
        .filter(|piece| !piece.is_empty())
        .collect()
}

fn join_pieces(pieces: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = pieces.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}
