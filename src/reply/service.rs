//! Question answering over the indexed documents.

use std::sync::Arc;
use std::time::Instant;

use super::moderation::{ContentModerator, is_query_meaningful};
use super::prompt::{answer_prompt, build_context, contextualize_prompt};
use super::session::{SessionStore, session_key};
use super::types::{HistoryMessage, ReplyError, ReplyRequest, ReplyResponse, SourceReference};
use crate::config::Config;
use crate::llm::LanguageModel;
use crate::vector_index::VectorIndex;

/// Limits applied by [`ReplyService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplySettings {
    /// Questions are cut to this many characters.
    pub max_query_chars: usize,
    /// Most recent history messages fed to the contextualizer.
    pub history_window: usize,
    /// Documents retrieved per question.
    pub top_k: usize,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            max_query_chars: 300,
            history_window: 6,
            top_k: 3,
        }
    }
}

impl ReplySettings {
    /// Settings taken from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_query_chars: config.max_query_chars,
            history_window: config.history_window,
            top_k: config.retrieval_top_k.max(1),
        }
    }
}

/// Answers questions with retrieval-augmented generation and per-session memory.
pub struct ReplyService {
    llm: Arc<dyn LanguageModel>,
    index: Arc<dyn VectorIndex>,
    moderator: Arc<dyn ContentModerator>,
    sessions: Arc<dyn SessionStore>,
    settings: ReplySettings,
}

struct ValidatedRequest {
    key: String,
    question: String,
    consent_timestamp: Option<String>,
}

impl ReplyService {
    /// Assemble the service from its collaborators.
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        index: Arc<dyn VectorIndex>,
        moderator: Arc<dyn ContentModerator>,
        sessions: Arc<dyn SessionStore>,
        settings: ReplySettings,
    ) -> Self {
        Self {
            llm,
            index,
            moderator,
            sessions,
            settings,
        }
    }

    /// Validate, moderate, contextualize, retrieve, answer, and record the exchange.
    pub async fn generate_reply(&self, request: ReplyRequest) -> Result<ReplyResponse, ReplyError> {
        let started = Instant::now();
        let ValidatedRequest {
            key,
            question,
            consent_timestamp,
        } = validate_request(request, self.settings.max_query_chars)?;

        if !self.moderator.is_content_safe(&question).await {
            return Err(ReplyError::ContentRejected);
        }

        let history = self.sessions.messages(&key).await?;
        let window_start = history.len().saturating_sub(self.settings.history_window);
        let history = &history[window_start..];

        let standalone_question = self
            .llm
            .complete(&contextualize_prompt(history, &question))
            .await?;
        tracing::debug!(
            session = %key,
            history = history.len(),
            standalone = %standalone_question,
            "Contextualized question"
        );

        let documents = self
            .index
            .similarity_search(&standalone_question, self.settings.top_k)
            .await?;
        let context = build_context(&documents);
        tracing::debug!(documents = documents.len(), "Retrieved context");

        let answer = self
            .llm
            .complete(&answer_prompt(&context, &standalone_question))
            .await?;
        if answer.trim().is_empty() {
            return Err(ReplyError::InvalidResponse);
        }

        self.sessions
            .append(
                &key,
                vec![
                    HistoryMessage::human(standalone_question.clone()),
                    HistoryMessage::ai(answer.clone()),
                ],
            )
            .await?;

        tracing::info!(
            session = %key,
            consent_timestamp = consent_timestamp.as_deref().unwrap_or("unspecified"),
            sources = documents.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Generated reply"
        );
        Ok(ReplyResponse {
            answer,
            standalone_question,
            sources: documents.iter().map(SourceReference::from).collect(),
        })
    }
}

/// Check a request in the order the client expects errors reported, then truncate its query.
fn validate_request(
    request: ReplyRequest,
    max_query_chars: usize,
) -> Result<ValidatedRequest, ReplyError> {
    if request.consent_accepted != Some(true) {
        return Err(ReplyError::InvalidRequest("Use policy rejected by user".into()));
    }
    let user_id = non_empty(request.user_id)
        .ok_or_else(|| ReplyError::InvalidRequest("No userId sent".into()))?;
    let session_id = non_empty(request.session_id)
        .ok_or_else(|| ReplyError::InvalidRequest("No sessionId sent".into()))?;
    let query =
        non_empty(request.query).ok_or_else(|| ReplyError::InvalidQuery("No query sent".into()))?;

    let consent_timestamp = non_empty(request.consent_timestamp);
    tracing::info!(
        user_id = %user_id,
        session_id = %session_id,
        consent_timestamp = consent_timestamp.as_deref().unwrap_or("unspecified"),
        "Use policy accepted"
    );

    let question: String = query.chars().take(max_query_chars).collect();
    if !is_query_meaningful(&question) {
        return Err(ReplyError::InvalidQuery("Please provide a more specific question".into()));
    }

    Ok(ValidatedRequest {
        key: session_key(&user_id, &session_id),
        question,
        consent_timestamp,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.is_empty())
}
