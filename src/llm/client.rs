//! Completion client abstraction.
//!
//! One trait at the seam between the flows and the network, an HTTP
//! implementation for OpenAI-compatible chat completion endpoints, and a
//! scripted client (see `scripted.rs`) for tests.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use crate::types::llm_data::{CompletionRequest, RawCompletionPayload};

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Everything one client instance needs; passed in explicitly, never global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("no API key provided")]
    MissingCredential,

    #[error("request timed out after {0} seconds")]
    Timeout(u64),

    #[error("the API key was rejected")]
    Unauthorized,

    #[error("rate limited by the completion service")]
    RateLimited,

    #[error("HTTP {status} from completion service: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected response format: {0}")]
    InvalidResponse(String),

    #[error("completion service returned an empty message")]
    EmptyResponse,
}

pub trait CompletionClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> Result<RawCompletionPayload, TransportError>;
}

pub struct HttpCompletionClient {
    config: ClientConfig,
    client: reqwest::blocking::Client,
}

impl HttpCompletionClient {
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        if config.api_key.trim().is_empty() {
            return Err(TransportError::MissingCredential);
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TransportError::Request(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

impl CompletionClient for HttpCompletionClient {
    fn complete(&self, request: &CompletionRequest) -> Result<RawCompletionPayload, TransportError> {
        let url = chat_completions_url(&self.config.endpoint);
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": request.system_prompt},
                {"role": "user", "content": request.user_input},
            ],
        });

        tracing::debug!(%url, model = %self.config.model, "sending completion request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.trim())
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.config.timeout_secs)
                } else {
                    TransportError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let json: Value = response
            .json()
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;

        message_content(&json).map(RawCompletionPayload::new)
    }
}

fn chat_completions_url(endpoint: &str) -> String {
    format!("{}/chat/completions", endpoint.trim_end_matches('/'))
}

fn status_error(status: StatusCode, body: &str) -> TransportError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Unauthorized,
        StatusCode::TOO_MANY_REQUESTS => TransportError::RateLimited,
        _ => TransportError::Http {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        },
    }
}

/// Pulls `choices[0].message.content` out of a chat completion response.
fn message_content(response: &Value) -> Result<String, TransportError> {
    let choice = response
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| TransportError::InvalidResponse("response has no choices".to_string()))?;

    let content = choice
        .get("message")
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .ok_or(TransportError::EmptyResponse)?;

    if content.trim().is_empty() {
        return Err(TransportError::EmptyResponse);
    }
    Ok(content.to_string())
}
