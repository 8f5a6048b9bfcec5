//! Cohere chat backend using the v2 chat API.
//!
//! Calls `POST {base_url}/v2/chat` directly with `reqwest`. The answer is the
//! first content block of the reply, trimmed of surrounding whitespace.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{FailureKind, ModelError, Result};
use crate::message::ChatMessage;
use crate::provider::ChatModel;

/// The default Cohere chat model.
pub const DEFAULT_COHERE_MODEL: &str = "command-r-plus-08-2024";

const PROVIDER: &str = "cohere";

/// A [`ChatModel`] backed by the Cohere chat API.
pub struct CohereChat {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl CohereChat {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        client: reqwest::Client,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(ModelError::Config("Cohere API key must not be empty".into()));
        }
        let model = model.into();
        if model.trim().is_empty() {
            return Err(ModelError::Config("Cohere model must not be empty".into()));
        }
        Ok(Self { client, api_key, base_url: base_url.into(), model })
    }

    fn chat_url(&self) -> String {
        format!("{}/v2/chat", self.base_url.trim_end_matches('/'))
    }
}

// ── Cohere API request/response types ──────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

/// Extract the first content block's text from a raw chat response body.
fn parse_reply(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body).map_err(|e| {
        ModelError::provider(PROVIDER, FailureKind::Malformed, format!("failed to parse response: {e}"))
    })?;
    response
        .message
        .content
        .into_iter()
        .next()
        .and_then(|block| block.text)
        .map(|text| text.trim().to_string())
        .ok_or_else(|| {
            ModelError::provider(PROVIDER, FailureKind::Malformed, "reply contained no content blocks")
        })
}

#[async_trait]
impl ChatModel for CohereChat {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate_response(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, message_count = messages.len(), "sending chat");

        let response = self
            .client
            .post(self.chat_url())
            .bearer_auth(&self.api_key)
            .json(&ChatRequest { model: &self.model, messages })
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                ModelError::provider(PROVIDER, FailureKind::from_reqwest(&e), format!("request failed: {e}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ModelError::provider(PROVIDER, FailureKind::Malformed, format!("failed to read response: {e}"))
        })?;

        if !status.is_success() {
            let detail =
                serde_json::from_str::<ErrorResponse>(&body).map(|e| e.message).unwrap_or(body);
            error!(provider = PROVIDER, %status, "API error");
            return Err(ModelError::provider(
                PROVIDER,
                FailureKind::from_status(status.as_u16(), &detail),
                format!("API returned {status}: {detail}"),
            ));
        }

        parse_reply(&body)
    }
}
