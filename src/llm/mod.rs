//! Language model abstraction and the OpenAI chat completions adapter.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::config::Config;

/// Errors raised by language model adapters.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Adapter requires credentials that were not configured.
    #[error("Missing API key for language model")]
    MissingApiKey,
    /// HTTP layer failed before a usable response arrived.
    #[error("Language model request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider answered with a non-success status after all retries.
    #[error("Language model returned {status}: {body}")]
    UnexpectedStatus {
        /// Final HTTP status.
        status: StatusCode,
        /// Response body, if any.
        body: String,
    },
    /// Provider answered without any completion text.
    #[error("Language model returned no content")]
    EmptyResponse,
}

/// Prompt-in, text-out language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send `prompt` as a system message and return the completion text.
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Generation settings for [`OpenAiChatModel`].
#[derive(Debug, Clone)]
pub struct ChatSettings {
    /// Chat model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Extra attempts after a rate-limited or failed (5xx) response.
    pub max_retries: u32,
    /// Delay before the first retry; doubled on each further retry.
    pub retry_base_delay: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".into(),
            temperature: 0.0,
            max_tokens: 800,
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// OpenAI `/chat/completions` client.
pub struct OpenAiChatModel {
    http: Client,
    base_url: String,
    api_key: String,
    settings: ChatSettings,
}

impl OpenAiChatModel {
    /// Build a chat model client against the API rooted at `base_url`.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        settings: ChatSettings,
    ) -> Result<Self, LlmError> {
        let http = Client::builder()
            .user_agent("pdfrag/chat")
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            settings,
        })
    }

    /// Build a chat model from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, LlmError> {
        let api_key = config.openai_api_key.clone().ok_or(LlmError::MissingApiKey)?;
        Self::new(
            config.openai_base_url.clone(),
            api_key,
            ChatSettings {
                model: config.openai_model.clone(),
                ..ChatSettings::default()
            },
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        self.settings.retry_base_delay * 2_u32.saturating_pow(attempt)
    }
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl LanguageModel for OpenAiChatModel {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let body = json!({
            "model": self.settings.model,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
            "messages": [{ "role": "system", "content": prompt }],
        });

        let mut attempt = 0;
        let response = loop {
            let response = self
                .http
                .post(self.endpoint())
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await?;
            let status = response.status();
            if status.is_success() {
                break response;
            }
            if !is_retryable(status) || attempt >= self.settings.max_retries {
                let body = response.text().await.unwrap_or_default();
                return Err(LlmError::UnexpectedStatus { status, body });
            }
            let delay = self.retry_delay(attempt);
            attempt += 1;
            tracing::warn!(
                status = %status,
                attempt,
                max_retries = self.settings.max_retries,
                delay_ms = delay.as_millis() as u64,
                "Chat completion failed; retrying"
            );
            tokio::time::sleep(delay).await;
        };

        let ChatResponse { choices } = response.json().await?;
        choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn model_for(server: &MockServer) -> OpenAiChatModel {
        OpenAiChatModel::new(
            server.base_url(),
            "sk-test",
            ChatSettings {
                retry_base_delay: Duration::ZERO,
                ..ChatSettings::default()
            },
        )
        .expect("client")
    }

    #[tokio::test]
    async fn sends_prompt_as_system_message() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/chat/completions")
                    .header("authorization", "Bearer sk-test")
                    .json_body_partial(
                        r#"{"model":"gpt-3.5-turbo","max_tokens":800,"messages":[{"role":"system","content":"Say hi"}]}"#,
                    );
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "hi" } }]
                }));
            })
            .await;

        let answer = model_for(&server).complete("Say hi").await.expect("answer");
        mock.assert();
        assert_eq!(answer, "hi");
    }

    #[tokio::test]
    async fn retries_server_errors_then_gives_up() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(503).body("overloaded");
            })
            .await;

        let error = model_for(&server)
            .complete("prompt")
            .await
            .expect_err("must fail");
        mock.assert_hits(3);
        assert!(matches!(
            error,
            LlmError::UnexpectedStatus { status, .. } if status == StatusCode::SERVICE_UNAVAILABLE
        ));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(400).body("bad request");
            })
            .await;

        let error = model_for(&server)
            .complete("prompt")
            .await
            .expect_err("must fail");
        mock.assert_hits(1);
        assert!(matches!(error, LlmError::UnexpectedStatus { .. }));
    }

    #[tokio::test]
    async fn missing_content_is_an_empty_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let error = model_for(&server)
            .complete("prompt")
            .await
            .expect_err("no choices");
        assert!(matches!(error, LlmError::EmptyResponse));
    }
}
