//! Model gateway: send a rendered [`Prompt`] to a chat-completions endpoint
//! and return the raw completion text.
//!
//! The gateway never interprets the completion; that is the job of
//! [`crate::pipeline::postprocess`]. Its only concern is turning transport
//! and provider failures into the right [`PipelineError`]:
//!
//! | Condition                              | Error                   |
//! |----------------------------------------|-------------------------|
//! | No API key configured                  | `MissingCredential`     |
//! | DNS / connect failure / timeout        | `UpstreamUnavailable`   |
//! | Non-2xx status                         | `UpstreamRejected`      |
//! | 2xx without `choices[0].message.content` | `UpstreamRejected`    |
//!
//! The key check happens before any network I/O, so a misconfigured server
//! fails every request immediately instead of waiting on a 401.
//!
//! [`CompletionProvider`] is the seam tests use to script responses without
//! a network.

use crate::config::GatewayConfig;
use crate::error::{preview, PipelineError, PREVIEW_CHARS};
use crate::prompts::Prompt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Anything that can turn a prompt pair into completion text.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, PipelineError>;
}

/// OpenAI-compatible chat-completions client (OpenRouter, Groq, ...).
///
/// Holds one [`reqwest::Client`], so connections are pooled across requests.
#[derive(Debug, Clone)]
pub struct ChatCompletionsGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl ChatCompletionsGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn missing_credential(&self) -> PipelineError {
        PipelineError::MissingCredential {
            provider: self.config.provider.to_string(),
            env_var: self.config.provider.api_key_env(),
        }
    }
}

#[async_trait]
impl CompletionProvider for ChatCompletionsGateway {
    async fn complete(&self, prompt: &Prompt) -> Result<String, PipelineError> {
        let key = self.config.credential().ok_or_else(|| self.missing_credential())?;

        let body = ChatRequest {
            model: &self.config.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        debug!(
            "{} answered HTTP {} in {:?} ({} bytes)",
            self.config.provider,
            status.as_u16(),
            start.elapsed(),
            text.len()
        );

        if !status.is_success() {
            warn!("{} rejected request: HTTP {}", self.config.provider, status.as_u16());
            return Err(PipelineError::UpstreamRejected {
                status: status.as_u16(),
                body: preview(&text, PREVIEW_CHARS),
            });
        }

        completion_text(&text).ok_or_else(|| PipelineError::UpstreamRejected {
            status: status.as_u16(),
            body: format!(
                "response carried no completion text: {}",
                preview(&text, PREVIEW_CHARS)
            ),
        })
    }
}

impl ChatCompletionsGateway {
    fn transport_error(&self, e: reqwest::Error) -> PipelineError {
        let detail = if e.is_timeout() {
            format!("no response within {}s", self.config.timeout_secs)
        } else {
            e.to_string()
        };
        warn!("{} unreachable: {}", self.config.provider, detail);
        PipelineError::UpstreamUnavailable { detail }
    }
}

/// `choices[0].message.content`, if present and a string.
fn completion_text(body: &str) -> Option<String> {
    let parsed: ChatResponse = serde_json::from_str(body).ok()?;
    parsed
        .choices
        .into_iter()
        .next()?
        .message?
        .content
}
