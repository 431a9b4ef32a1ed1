use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use crate::ingestion::{IndexerSettings, SplitterConfig, ValidationThresholds};

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for ingestion and the reply flow.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Qdrant instance that stores embeddings.
    pub qdrant_url: String,
    /// Name of the Qdrant collection acting as the vector index.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// API key for OpenAI-backed adapters (embeddings, chat, moderation).
    pub openai_api_key: Option<String>,
    /// Root URL of the OpenAI-compatible API.
    pub openai_base_url: String,
    /// Chat model used for contextualization and answers.
    pub openai_model: String,
    /// Flat directory scanned for PDF files.
    pub documents_dir: String,
    /// Target chunk length in characters.
    pub text_splitter_chunk_size: usize,
    /// Characters shared between neighbouring chunks.
    pub text_splitter_chunk_overlap: usize,
    /// Minimum cleaned chunk length accepted by the validator.
    pub chunk_min_length: usize,
    /// Minimum share of alphanumeric characters in an accepted chunk.
    pub chunk_min_alnum_density: f64,
    /// Minimum number of distinct (case-insensitive) characters in an accepted chunk.
    pub chunk_min_distinct_chars: usize,
    /// Maximum chunks submitted per vector index write.
    pub ingest_batch_size: usize,
    /// Total write attempts per batch before it is abandoned.
    pub ingest_max_retries: u32,
    /// Pause after each successful batch, in milliseconds.
    pub ingest_batch_pause_ms: u64,
    /// Lifetime of a conversation history, in seconds.
    pub session_ttl_secs: u64,
    /// Number of history messages fed to the contextualizer.
    pub history_window: usize,
    /// Documents retrieved per question.
    pub retrieval_top_k: usize,
    /// Questions are truncated to this many characters.
    pub max_query_chars: usize,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hosted OpenAI embeddings API.
    OpenAI,
    /// Deterministic local hashing, useful offline and in tests.
    Hashed,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env("QDRANT_COLLECTION_NAME")?,
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: load_env_optional("EMBEDDING_PROVIDER")
                .unwrap_or_else(|| "openai".into())
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".into()),
            embedding_dimension: parse_env_or("EMBEDDING_DIMENSION", 1536)?,
            openai_api_key: load_env_optional("OPENAI_API_KEY"),
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".into()),
            openai_model: load_env_optional("OPENAI_MODEL")
                .unwrap_or_else(|| "gpt-3.5-turbo".into()),
            documents_dir: load_env_optional("DOCUMENTS_DIR").unwrap_or_else(|| "./data".into()),
            text_splitter_chunk_size: parse_env_or("TEXT_SPLITTER_CHUNK_SIZE", 800)?,
            text_splitter_chunk_overlap: parse_env_or("TEXT_SPLITTER_CHUNK_OVERLAP", 100)?,
            chunk_min_length: parse_env_or("CHUNK_MIN_LENGTH", 100)?,
            chunk_min_alnum_density: parse_ratio_env_or("CHUNK_MIN_ALNUM_DENSITY", 0.7)?,
            chunk_min_distinct_chars: parse_env_or("CHUNK_MIN_DISTINCT_CHARS", 10)?,
            ingest_batch_size: parse_env_or("INGEST_BATCH_SIZE", 25)?,
            ingest_max_retries: parse_env_or("INGEST_MAX_RETRIES", 3)?,
            ingest_batch_pause_ms: parse_env_or("INGEST_BATCH_PAUSE_MS", 100)?,
            session_ttl_secs: parse_env_or("SESSION_TTL_SECS", 7200)?,
            history_window: parse_env_or("HISTORY_WINDOW", 6)?,
            retrieval_top_k: parse_env_or("RETRIEVAL_TOP_K", 3)?,
            max_query_chars: parse_env_or("MAX_QUERY_CHARS", 300)?,
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }

    /// Splitter settings derived from the text splitter variables.
    pub fn splitter_config(&self) -> SplitterConfig {
        SplitterConfig {
            chunk_size: self.text_splitter_chunk_size,
            chunk_overlap: self.text_splitter_chunk_overlap,
            ..SplitterConfig::default()
        }
    }

    /// Chunk validation thresholds.
    pub fn validation_thresholds(&self) -> ValidationThresholds {
        ValidationThresholds {
            min_length: self.chunk_min_length,
            min_alnum_density: self.chunk_min_alnum_density,
            min_distinct_chars: self.chunk_min_distinct_chars,
        }
    }

    /// Batch indexer settings.
    pub fn indexer_settings(&self) -> IndexerSettings {
        IndexerSettings {
            batch_size: self.ingest_batch_size.max(1),
            max_retries: self.ingest_max_retries.max(1),
            pause: Duration::from_millis(self.ingest_batch_pause_ms),
            ..IndexerSettings::default()
        }
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match load_env_optional(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
        None => Ok(default),
    }
}

/// Like [`parse_env_or`], but only accepts finite values within `0.0..=1.0`.
fn parse_ratio_env_or(key: &str, default: f64) -> Result<f64, ConfigError> {
    let value = parse_env_or(key, default)?;
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue(key.to_string()))
    }
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "hashed" => Ok(Self::Hashed),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, if [`init_config`] has run.
pub fn get_config() -> Option<&'static Config> {
    CONFIG.get()
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    if let Some(existing) = CONFIG.get() {
        return Ok(existing);
    }
    let config = Config::from_env()?;
    tracing::debug!(
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        documents_dir = %config.documents_dir,
        server_port = ?config.server_port,
        embedding_provider = ?config.embedding_provider,
        "Loaded configuration"
    );
    Ok(CONFIG.get_or_init(|| config))
}
