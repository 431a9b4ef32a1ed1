//! Request, response, history, and error types for the reply flow.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmError;
use crate::vector_index::{RetrievedDocument, VectorIndexError};

/// Incoming question from a user.
///
/// Every field is optional on the wire so missing values surface as validation errors with the
/// right message instead of a generic deserialization failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    /// Whether the user accepted the use policy.
    #[serde(default)]
    pub consent_accepted: Option<bool>,
    /// When consent was given. Logged with the consent check and with each generated reply.
    #[serde(default)]
    pub consent_timestamp: Option<String>,
    /// Caller identity.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Conversation identity, scoped to the user.
    #[serde(default)]
    pub session_id: Option<String>,
    /// The user's question.
    #[serde(default)]
    pub query: Option<String>,
}

/// Answer returned to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyResponse {
    /// Model answer grounded in the retrieved context.
    pub answer: String,
    /// Question after rewriting against the conversation history.
    pub standalone_question: String,
    /// Documents the answer was grounded on, best match first.
    pub sources: Vec<SourceReference>,
}

/// Pointer to a document used as context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    /// Document title.
    pub title: String,
    /// Source file name, when recorded.
    pub filename: Option<String>,
    /// Page the chunk came from, when recorded.
    pub page_number: Option<u64>,
    /// Similarity score.
    pub score: f32,
}

impl From<&RetrievedDocument> for SourceReference {
    fn from(document: &RetrievedDocument) -> Self {
        Self {
            title: document.title().to_string(),
            filename: document
                .metadata
                .get("filename")
                .and_then(|value| value.as_str())
                .map(str::to_string),
            page_number: document
                .metadata
                .get("page_number")
                .and_then(|value| value.as_u64()),
            score: document.score,
        }
    }
}

/// Author of a history message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The user.
    Human,
    /// The assistant.
    Ai,
}

/// One entry in a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    /// Who wrote the message.
    pub role: MessageRole,
    /// Message text.
    pub content: String,
}

impl HistoryMessage {
    /// Message written by the user.
    pub fn human(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Human,
            content: content.into(),
        }
    }

    /// Message written by the assistant.
    pub fn ai(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Ai,
            content: content.into(),
        }
    }
}

/// Errors raised by session stores.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Backing store could not be reached or refused the operation.
    #[error("Session store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the reply flow, each mapped to an HTTP status.
#[derive(Debug, Error)]
pub enum ReplyError {
    /// Request is missing consent or caller identity.
    #[error("{0}")]
    InvalidRequest(String),
    /// Question is missing or too vague to answer.
    #[error("{0}")]
    InvalidQuery(String),
    /// Moderation flagged the question.
    #[error("Content moderation failed: inappropriate content detected")]
    ContentRejected,
    /// Language model call failed.
    #[error(transparent)]
    Llm(#[from] LlmError),
    /// Similarity search failed.
    #[error(transparent)]
    Retrieval(#[from] VectorIndexError),
    /// Session history could not be read or written.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Model produced an empty answer.
    #[error("Invalid response format from language model")]
    InvalidResponse,
}

impl ReplyError {
    /// HTTP status reported for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidQuery(_) => StatusCode::BAD_REQUEST,
            Self::ContentRejected
            | Self::Llm(_)
            | Self::Retrieval(_)
            | Self::Session(_)
            | Self::InvalidResponse => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable category.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "REQUEST_ERROR",
            Self::InvalidQuery(_) => "CHAT_ERROR",
            Self::ContentRejected => "MODERATION_ERROR",
            Self::Llm(_) | Self::InvalidResponse => "LLM_ERROR",
            Self::Retrieval(_) => "RETRIEVAL_ERROR",
            Self::Session(_) => "SESSION_ERROR",
        }
    }
}
