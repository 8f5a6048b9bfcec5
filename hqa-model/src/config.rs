//! Provider credentials and connection settings.
//!
//! Every field resolves with the same precedence: an explicitly set value wins,
//! then the provider's environment variable, then a built-in default (where one
//! exists). Resolution happens when a client is built, not when the settings are
//! constructed, so a long-lived factory picks up rotated environment values.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

pub const AZURE_OPENAI_ENDPOINT_ENV: &str = "AZURE_OPENAI_ENDPOINT";
pub const AZURE_OPENAI_API_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";
pub const AZURE_OPENAI_API_VERSION_ENV: &str = "AZURE_OPENAI_API_VERSION";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const OPENAI_BASE_URL_ENV: &str = "OPENAI_BASE_URL";
pub const COHERE_API_KEY_ENV: &str = "COHERE_API_KEY";
pub const COHERE_BASE_URL_ENV: &str = "COHERE_BASE_URL";

pub const DEFAULT_AZURE_API_VERSION: &str = "2024-06-01";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_COHERE_BASE_URL: &str = "https://api.cohere.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Resolve a setting: explicit value, then environment variable, then default.
pub fn resolve(explicit: Option<&str>, env_key: &str, default: Option<&str>) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(env_key).ok().filter(|v| !v.trim().is_empty()))
        .or_else(|| default.map(str::to_string))
}

fn required(value: Option<String>, what: &str, env_key: &str) -> Result<String> {
    value.ok_or_else(|| {
        ModelError::Config(format!("{what} is not configured (set it explicitly or via {env_key})"))
    })
}

/// Azure OpenAI endpoint, credential, and API version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureSettings {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_version: Option<String>,
}

/// Azure settings after precedence resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAzure {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
}

impl AzureSettings {
    pub fn resolve(&self) -> Result<ResolvedAzure> {
        Ok(ResolvedAzure {
            endpoint: required(
                resolve(self.endpoint.as_deref(), AZURE_OPENAI_ENDPOINT_ENV, None),
                "Azure OpenAI endpoint",
                AZURE_OPENAI_ENDPOINT_ENV,
            )?,
            api_key: required(
                resolve(self.api_key.as_deref(), AZURE_OPENAI_API_KEY_ENV, None),
                "Azure OpenAI API key",
                AZURE_OPENAI_API_KEY_ENV,
            )?,
            api_version: resolve(
                self.api_version.as_deref(),
                AZURE_OPENAI_API_VERSION_ENV,
                Some(DEFAULT_AZURE_API_VERSION),
            )
            .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
        })
    }
}

/// OpenAI (or OpenAI-compatible) credential and base URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenAISettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl OpenAISettings {
    /// Returns `(api_key, base_url)`.
    pub fn resolve(&self) -> Result<(String, String)> {
        let api_key = required(
            resolve(self.api_key.as_deref(), OPENAI_API_KEY_ENV, None),
            "OpenAI API key",
            OPENAI_API_KEY_ENV,
        )?;
        let base_url =
            resolve(self.base_url.as_deref(), OPENAI_BASE_URL_ENV, Some(DEFAULT_OPENAI_BASE_URL))
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());
        Ok((api_key, base_url))
    }
}

/// Cohere credential and base URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CohereSettings {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl CohereSettings {
    /// Returns `(api_key, base_url)`.
    pub fn resolve(&self) -> Result<(String, String)> {
        let api_key = required(
            resolve(self.api_key.as_deref(), COHERE_API_KEY_ENV, None),
            "Cohere API key",
            COHERE_API_KEY_ENV,
        )?;
        let base_url =
            resolve(self.base_url.as_deref(), COHERE_BASE_URL_ENV, Some(DEFAULT_COHERE_BASE_URL))
                .unwrap_or_else(|| DEFAULT_COHERE_BASE_URL.to_string());
        Ok((api_key, base_url.trim_end_matches('/').to_string()))
    }
}

/// Credentials for every supported provider plus the shared HTTP timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderCredentials {
    pub azure: AzureSettings,
    pub openai: OpenAISettings,
    pub cohere: CohereSettings,
    /// Request timeout applied to every provider HTTP call.
    pub timeout_secs: u64,
}

impl Default for ProviderCredentials {
    fn default() -> Self {
        Self {
            azure: AzureSettings::default(),
            openai: OpenAISettings::default(),
            cohere: CohereSettings::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ProviderCredentials {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Build the `reqwest` client every provider shares, with an explicit timeout.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ModelError::Config(format!("failed to build HTTP client: {e}")))
}
