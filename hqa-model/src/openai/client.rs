//! OpenAI and Azure OpenAI chat clients.

use async_openai::config::{AzureConfig as AsyncAzureConfig, Config, OpenAIConfig as AsyncOpenAIConfig};
use async_openai::types::CreateChatCompletionRequestArgs;
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, error};

use super::convert;
use crate::config::ResolvedAzure;
use crate::error::{FailureKind, ModelError, Result};
use crate::message::ChatMessage;
use crate::provider::ChatModel;

async fn complete<C: Config>(
    client: &Client<C>,
    provider: &str,
    model: &str,
    messages: &[ChatMessage],
) -> Result<String> {
    let messages = messages
        .iter()
        .map(convert::to_request_message)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| {
            ModelError::provider(provider, FailureKind::Rejected, format!("invalid message: {e}"))
        })?;

    let request = CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages(messages)
        .build()
        .map_err(|e| {
            ModelError::provider(provider, FailureKind::Rejected, format!("failed to build request: {e}"))
        })?;

    debug!(provider, model, "sending chat completion");
    let response = client.chat().create(request).await.map_err(|e| {
        error!(provider, model, error = %e, "chat completion failed");
        convert::map_openai_error(provider, e)
    })?;

    convert::first_choice_text(provider, response)
}

/// Chat client for the public OpenAI API or any OpenAI-compatible server.
pub struct OpenAIChat {
    client: Client<AsyncOpenAIConfig>,
    model: String,
}

impl OpenAIChat {
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: impl Into<String>,
        http: reqwest::Client,
    ) -> Self {
        let config = AsyncOpenAIConfig::new().with_api_key(api_key).with_api_base(base_url);
        Self { client: Client::with_config(config).with_http_client(http), model: model.into() }
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate_response(&self, messages: &[ChatMessage]) -> Result<String> {
        complete(&self.client, "openai", &self.model, messages).await
    }
}

/// Azure OpenAI chat client bound to a single deployment.
pub struct AzureOpenAIChat {
    client: Client<AsyncAzureConfig>,
    deployment_id: String,
}

impl AzureOpenAIChat {
    pub fn new(settings: &ResolvedAzure, deployment_id: impl Into<String>, http: reqwest::Client) -> Self {
        let deployment_id = deployment_id.into();
        let config = AsyncAzureConfig::new()
            .with_api_base(&settings.endpoint)
            .with_api_version(&settings.api_version)
            .with_deployment_id(&deployment_id)
            .with_api_key(&settings.api_key);

        Self { client: Client::with_config(config).with_http_client(http), deployment_id }
    }

    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }
}

#[async_trait]
impl ChatModel for AzureOpenAIChat {
    fn name(&self) -> &str {
        &self.deployment_id
    }

    async fn generate_response(&self, messages: &[ChatMessage]) -> Result<String> {
        // Azure uses the deployment id as the model
        complete(&self.client, "azure_openai", &self.deployment_id, messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn azure_client_keeps_explicit_deployment() {
        let settings = ResolvedAzure {
            endpoint: "https://example.openai.azure.com".into(),
            api_key: "key".into(),
            api_version: "2024-06-01".into(),
        };
        let chat = AzureOpenAIChat::new(&settings, "gpt-4o-eval", reqwest::Client::new());
        assert_eq!(chat.deployment_id(), "gpt-4o-eval");
        assert_eq!(chat.name(), "gpt-4o-eval");
    }
}
