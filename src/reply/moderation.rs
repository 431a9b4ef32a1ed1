//! Question screening: a cheap vagueness check and the moderation classifier.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Minimum number of space-separated parts a question needs.
pub const MIN_QUERY_WORDS: usize = 3;

/// True when the trimmed, lower-cased `question` splits on single spaces into at least
/// [`MIN_QUERY_WORDS`] parts. Consecutive spaces produce empty parts, which still count.
pub fn is_query_meaningful(question: &str) -> bool {
    question.trim().to_lowercase().split(' ').count() >= MIN_QUERY_WORDS
}

/// Boolean safety classifier.
#[async_trait]
pub trait ContentModerator: Send + Sync {
    /// Whether `text` may be processed. Implementations fail open.
    async fn is_content_safe(&self, text: &str) -> bool;
}

/// OpenAI `/moderations` classifier.
pub struct OpenAiModerator {
    http: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

#[derive(Deserialize)]
struct ModerationResult {
    flagged: bool,
}

impl OpenAiModerator {
    /// Build a moderator against the API rooted at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent("pdfrag/moderation")
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    async fn flagged(&self, text: &str) -> Result<bool, reqwest::Error> {
        let response: ModerationResponse = self
            .http
            .post(format!("{}/moderations", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&json!({ "input": text }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.results.iter().any(|result| result.flagged))
    }
}

#[async_trait]
impl ContentModerator for OpenAiModerator {
    async fn is_content_safe(&self, text: &str) -> bool {
        match self.flagged(text).await {
            Ok(flagged) => {
                if flagged {
                    tracing::warn!("Moderation flagged question");
                }
                !flagged
            }
            Err(error) => {
                tracing::error!(error = %error, "Moderation check failed; allowing content");
                true
            }
        }
    }
}

/// Moderator that accepts everything; used when no moderation credentials are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllModerator;

#[async_trait]
impl ContentModerator for AllowAllModerator {
    async fn is_content_safe(&self, _text: &str) -> bool {
        true
    }
}
