//! Provider selection and the uniform generation capability.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cohere::CohereChat;
use crate::config::{ProviderCredentials, http_client};
use crate::error::{ModelError, Result};
use crate::message::ChatMessage;
use crate::openai::{AzureOpenAIChat, OpenAIChat};

/// A backend that turns an ordered message list into a single answer string.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// The model or deployment this backend is bound to.
    fn name(&self) -> &str;

    /// Generate a completion for the given messages.
    async fn generate_response(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// The closed set of supported provider discriminators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    AzureOpenai,
    Openai,
    Cohere,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [Self::AzureOpenai, Self::Openai, Self::Cohere];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AzureOpenai => "azure_openai",
            Self::Openai => "openai",
            Self::Cohere => "cohere",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ModelError::UnsupportedProvider(s.to_string()))
    }
}

/// One concrete backend, exhaustively matchable.
pub enum ChatProvider {
    AzureOpenai(AzureOpenAIChat),
    Openai(OpenAIChat),
    Cohere(CohereChat),
}

impl ChatProvider {
    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::AzureOpenai(_) => ProviderKind::AzureOpenai,
            Self::Openai(_) => ProviderKind::Openai,
            Self::Cohere(_) => ProviderKind::Cohere,
        }
    }
}

#[async_trait]
impl ChatModel for ChatProvider {
    fn name(&self) -> &str {
        match self {
            Self::AzureOpenai(chat) => chat.name(),
            Self::Openai(chat) => chat.name(),
            Self::Cohere(chat) => chat.name(),
        }
    }

    async fn generate_response(&self, messages: &[ChatMessage]) -> Result<String> {
        match self {
            Self::AzureOpenai(chat) => chat.generate_response(messages).await,
            Self::Openai(chat) => chat.generate_response(messages).await,
            Self::Cohere(chat) => chat.generate_response(messages).await,
        }
    }
}

/// Builds a [`ChatModel`] for a resolved `(provider, model)` pair.
///
/// The orchestrator asks the factory for a fresh backend on every call so
/// per-call overrides of provider and model take effect immediately.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, kind: ProviderKind, model: &str) -> Result<Arc<dyn ChatModel>>;
}

/// A [`ProviderFactory`] that builds real HTTP backends from
/// [`ProviderCredentials`], resolving each credential at build time.
pub struct EnvProviderFactory {
    credentials: ProviderCredentials,
    http: reqwest::Client,
}

impl EnvProviderFactory {
    pub fn new(credentials: ProviderCredentials) -> Result<Self> {
        let http = http_client(credentials.timeout())?;
        Ok(Self { credentials, http })
    }

    /// Build the concrete backend without erasing its type.
    pub fn build(&self, kind: ProviderKind, model: &str) -> Result<ChatProvider> {
        if model.trim().is_empty() {
            return Err(ModelError::Config(format!("model for provider '{kind}' must not be empty")));
        }
        debug!(provider = %kind, model, "building chat provider");
        match kind {
            ProviderKind::AzureOpenai => {
                let azure = self.credentials.azure.resolve()?;
                Ok(ChatProvider::AzureOpenai(AzureOpenAIChat::new(&azure, model, self.http.clone())))
            }
            ProviderKind::Openai => {
                let (api_key, base_url) = self.credentials.openai.resolve()?;
                Ok(ChatProvider::Openai(OpenAIChat::new(&api_key, &base_url, model, self.http.clone())))
            }
            ProviderKind::Cohere => {
                let (api_key, base_url) = self.credentials.cohere.resolve()?;
                Ok(ChatProvider::Cohere(CohereChat::new(api_key, base_url, model, self.http.clone())?))
            }
        }
    }
}

impl ProviderFactory for EnvProviderFactory {
    fn create(&self, kind: ProviderKind, model: &str) -> Result<Arc<dyn ChatModel>> {
        Ok(Arc::new(self.build(kind, model)?))
    }
}
