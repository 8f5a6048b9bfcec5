//! Chat message types shared by every provider.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::provider::{ProviderFactory, ProviderKind};

/// The author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single `{role, content}` chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// A fully resolved generation request: which backend, which model, what to send.
///
/// Built fresh for every call; the same request is never replayed against a
/// different provider since each backend interprets `model` differently
/// (Azure treats it as a deployment id, the others as a model id).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderRequest {
    pub provider: ProviderKind,
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

impl ProviderRequest {
    pub fn new(provider: ProviderKind, model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self { provider, model: model.into(), messages }
    }

    /// Build the backend for this request through `factory` and generate one answer.
    pub async fn send(&self, factory: &dyn ProviderFactory) -> Result<String> {
        let model = factory.create(self.provider, &self.model)?;
        model.generate_response(&self.messages).await
    }
}
