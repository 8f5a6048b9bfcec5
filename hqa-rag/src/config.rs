//! Configuration for the retrieval and answering pipeline.
//!
//! Settings come from three layers: built-in defaults, an optional YAML file
//! overlaid onto them with [`overlay_value`], and a few environment overrides.
//! Per-call LLM overrides are applied with the typed [`LlmSettings::overlay`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use hqa_model::ProviderCredentials;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::{RagError, Result};

pub const QDRANT_URL_ENV: &str = "QDRANT_URL";

/// Overlay `overrides` onto `base`, returning a new tree.
///
/// For every key in `overrides`: keys absent from `base` are ignored; when both
/// values are objects the merge recurses; otherwise the override replaces the
/// base value, whatever its type. `base` is never modified.
pub fn overlay_value(base: &Value, overrides: &Value) -> Value {
    let (Value::Object(base_map), Value::Object(override_map)) = (base, overrides) else {
        return base.clone();
    };

    let mut merged = base_map.clone();
    for (key, value) in override_map {
        if let Some(existing) = merged.get_mut(key) {
            *existing = if existing.is_object() && value.is_object() {
                overlay_value(existing, value)
            } else {
                value.clone()
            };
        }
    }
    Value::Object(merged)
}

/// Which backend produces dense and sparse vectors for the Qdrant store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// OpenAI embeddings for dense vectors, term frequencies for sparse ones.
    Openai,
    /// Local fastembed models for both.
    Fastembed,
}

/// Vector store connection and retrieval limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QdrantSettings {
    pub url: String,
    pub embedding_backend: EmbeddingBackend,
    pub dense_model: String,
    pub sparse_model: String,
    /// Number of passages embedded and upserted per batch during ingestion.
    pub chunk_size: usize,
    /// Number of first-stage candidates fed to the reranker.
    pub search_limit: usize,
    /// Number of passages kept after reranking.
    pub reranker_limit: usize,
    pub on_disk_payload: bool,
}

impl Default for QdrantSettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            embedding_backend: EmbeddingBackend::Openai,
            dense_model: "text-embedding-3-small".to_string(),
            sparse_model: "prithivida/Splade_PP_en_v1".to_string(),
            chunk_size: 64,
            search_limit: 10,
            reranker_limit: 5,
            on_disk_payload: true,
        }
    }
}

/// Which reranking strategy the searcher uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankerKind {
    /// Local pairwise cross-encoder.
    CrossEncoder,
    /// Cohere's hosted rerank endpoint.
    Cohere,
    /// Keep retrieval order.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RerankerSettings {
    pub kind: RerankerKind,
    pub model: String,
}

impl Default for RerankerSettings {
    fn default() -> Self {
        Self { kind: RerankerKind::Cohere, model: "rerank-v3.5".to_string() }
    }
}

pub const DEFAULT_PROMPT: &str = "You are a helpful assistant. Answer the question using only the \
given contexts. Keep the answer short and straightforward. If the contexts do not contain the \
answer, reply with 'There is no answer.'";

/// Static LLM settings: the system prompt plus the default model and provider.
///
/// `provider` stays a plain string so an override naming an unsupported
/// backend survives until the orchestrator rejects it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmSettings {
    pub prompt: String,
    pub model: String,
    pub provider: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_PROMPT.to_string(),
            model: "command-r-plus-08-2024".to_string(),
            provider: "cohere".to_string(),
        }
    }
}

/// A per-call patch over [`LlmSettings`]; `None` keeps the base value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmOverrides {
    pub prompt: Option<String>,
    pub model: Option<String>,
    pub provider: Option<String>,
}

impl LlmOverrides {
    pub fn is_empty(&self) -> bool {
        self.prompt.is_none() && self.model.is_none() && self.provider.is_none()
    }
}

impl LlmSettings {
    /// Return a copy of these settings with every set override applied.
    pub fn overlay(&self, overrides: &LlmOverrides) -> LlmSettings {
        LlmSettings {
            prompt: overrides.prompt.clone().unwrap_or_else(|| self.prompt.clone()),
            model: overrides.model.clone().unwrap_or_else(|| self.model.clone()),
            provider: overrides.provider.clone().unwrap_or_else(|| self.provider.clone()),
        }
    }
}

/// Batch evaluation pacing and judge settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvalSettings {
    /// Delay inserted between evaluation chunks.
    pub pacing_secs: u64,
    pub chunks_amount: usize,
    /// Sentinel substituted for missing answers before scoring.
    pub no_answer: String,
    pub metrics: Vec<String>,
    pub judge_provider: String,
    pub judge_model: String,
}

impl Default for EvalSettings {
    fn default() -> Self {
        Self {
            pacing_secs: 10,
            chunks_amount: 5,
            no_answer: "There is no answer.".to_string(),
            metrics: vec![
                "answer_correctness".to_string(),
                "answer_relevancy".to_string(),
                "context_precision".to_string(),
                "context_recall".to_string(),
            ],
            judge_provider: "azure_openai".to_string(),
            judge_model: "gpt-4o".to_string(),
        }
    }
}

/// Outbound HTTP behaviour shared by every provider client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpSettings {
    pub timeout_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self { timeout_secs: hqa_model::config::DEFAULT_TIMEOUT_SECS }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Top-level settings tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub qdrant: QdrantSettings,
    pub reranker: RerankerSettings,
    pub llm: LlmSettings,
    pub eval: EvalSettings,
    pub http: HttpSettings,
    pub providers: ProviderCredentials,
    /// JSON document mapping collection names to ingested file names.
    pub registry_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            qdrant: QdrantSettings::default(),
            reranker: RerankerSettings::default(),
            llm: LlmSettings::default(),
            eval: EvalSettings::default(),
            http: HttpSettings::default(),
            providers: ProviderCredentials::default(),
            registry_path: PathBuf::from("qdrant_collections.json"),
        }
    }
}

impl Settings {
    /// Load settings from a YAML file overlaid onto the defaults, then apply
    /// environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Settings> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| RagError::io(path, e))?;
        let settings = Self::from_yaml_str(&text)?.with_env_overrides();
        settings.validate()?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Parse a YAML document and overlay it onto the defaults. Keys that are
    /// not part of the settings tree are ignored.
    pub fn from_yaml_str(text: &str) -> Result<Settings> {
        let user: Value = serde_yaml::from_str(text)
            .map_err(|e| RagError::ConfigError(format!("invalid settings YAML: {e}")))?;
        let defaults = serde_json::to_value(Settings::default())
            .map_err(|e| RagError::ConfigError(format!("failed to encode defaults: {e}")))?;
        let merged = match user {
            Value::Null => defaults,
            user => overlay_value(&defaults, &user),
        };
        serde_json::from_value(merged)
            .map_err(|e| RagError::ConfigError(format!("invalid settings: {e}")))
    }

    /// Provider credentials carrying the configured HTTP timeout.
    pub fn provider_credentials(&self) -> ProviderCredentials {
        ProviderCredentials { timeout_secs: self.http.timeout_secs, ..self.providers.clone() }
    }

    /// Apply `QDRANT_URL` if set.
    pub fn with_env_overrides(mut self) -> Settings {
        if let Ok(url) = std::env::var(QDRANT_URL_ENV) {
            if !url.trim().is_empty() {
                self.qdrant.url = url;
            }
        }
        self
    }

    /// Check that the limits are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size`, `search_limit` or `reranker_limit` is zero
    /// - `search_limit < reranker_limit`
    /// - `http.timeout_secs` or `eval.chunks_amount` is zero
    pub fn validate(&self) -> Result<()> {
        let q = &self.qdrant;
        if q.chunk_size == 0 {
            return Err(RagError::ConfigError("qdrant.chunk_size must be greater than zero".into()));
        }
        if q.search_limit == 0 || q.reranker_limit == 0 {
            return Err(RagError::ConfigError(
                "qdrant.search_limit and qdrant.reranker_limit must be greater than zero".into(),
            ));
        }
        if q.search_limit < q.reranker_limit {
            return Err(RagError::ConfigError(format!(
                "qdrant.search_limit ({}) must be at least qdrant.reranker_limit ({})",
                q.search_limit, q.reranker_limit
            )));
        }
        if self.http.timeout_secs == 0 {
            return Err(RagError::ConfigError("http.timeout_secs must be greater than zero".into()));
        }
        if self.eval.chunks_amount == 0 {
            return Err(RagError::ConfigError("eval.chunks_amount must be greater than zero".into()));
        }
        Ok(())
    }
}
