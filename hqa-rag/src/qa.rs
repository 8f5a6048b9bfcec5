//! Grounded answering: rerank, build the prompt, ask a chat provider.

use std::sync::Arc;

use hqa_model::{ChatMessage, ProviderFactory, ProviderKind, ProviderRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{LlmOverrides, LlmSettings};
use crate::error::{RagError, Result};
use crate::retriever::HybridSearcher;

/// One answered question with the context it was grounded on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaResult {
    pub question: String,
    /// The reranked passages, serialized as a JSON array of strings.
    pub context: String,
    pub answer: String,
}

impl QaResult {
    /// The context passages as a list.
    pub fn contexts(&self) -> Vec<String> {
        serde_json::from_str(&self.context).unwrap_or_else(|_| vec![self.context.clone()])
    }
}

/// Retrieve, rerank and answer with whichever provider the call selects.
///
/// The chat backend is built fresh for every call from the resolved
/// `(provider, model)` pair, so per-call overrides take effect immediately.
pub struct QaChain {
    searcher: Arc<HybridSearcher>,
    llm: LlmSettings,
    factory: Arc<dyn ProviderFactory>,
}

impl QaChain {
    pub fn new(searcher: Arc<HybridSearcher>, llm: LlmSettings, factory: Arc<dyn ProviderFactory>) -> Self {
        Self { searcher, llm, factory }
    }

    pub fn searcher(&self) -> &Arc<HybridSearcher> {
        &self.searcher
    }

    pub fn llm_settings(&self) -> &LlmSettings {
        &self.llm
    }

    /// Answer `query` from `collection`.
    ///
    /// The provider discriminator is resolved before any retrieval, so an
    /// unsupported provider fails without touching the store. Provider errors
    /// propagate unchanged; there is no retry.
    pub async fn qa_chain(&self, collection: &str, query: &str, overrides: &LlmOverrides) -> Result<QaResult> {
        if collection.trim().is_empty() {
            return Err(RagError::InvalidInput("collection name must not be empty".into()));
        }
        if query.trim().is_empty() {
            return Err(RagError::InvalidInput("query must not be empty".into()));
        }

        let llm = self.llm.overlay(overrides);
        let provider: ProviderKind = llm.provider.parse()?;

        let contexts = self.searcher.search_with_rerank(collection, query, None).await?;
        let context = serde_json::to_string(&contexts)
            .map_err(|e| RagError::InvalidInput(format!("context is not serializable: {e}")))?;

        let request = ProviderRequest::new(
            provider,
            llm.model.as_str(),
            vec![
                ChatMessage::system(llm.prompt.clone()),
                ChatMessage::user(format!("Question: {query}")),
                ChatMessage::user(format!("Contexts: {context}")),
            ],
        );
        debug!(provider = %provider, model = %llm.model, contexts = contexts.len(), "asking chat provider");

        let answer = request.send(self.factory.as_ref()).await?;
        info!(collection, provider = %provider, model = %llm.model, "question answered");

        Ok(QaResult { question: query.to_string(), context, answer })
    }

    /// Boundary form of [`qa_chain`](QaChain::qa_chain) with each override optional.
    pub async fn answer_question(
        &self,
        collection: &str,
        query: &str,
        prompt: Option<String>,
        model: Option<String>,
        provider: Option<String>,
    ) -> Result<QaResult> {
        self.qa_chain(collection, query, &LlmOverrides { prompt, model, provider }).await
    }
}
