#![deny(missing_docs)]

//! PDF ingestion into a Qdrant vector index and retrieval-augmented replies over it.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// PDF ingestion pipeline.
pub mod ingestion;
/// Language model abstraction and adapters.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// Retrieval-augmented reply flow.
pub mod reply;
/// Application service shared by the CLI and HTTP surfaces.
pub mod service;
/// Vector index abstraction and Qdrant backend.
pub mod vector_index;
