//! Two-stage search: hybrid retrieval, then reranking.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::QdrantSettings;
use crate::document::Passage;
use crate::error::{RagError, Result};
use crate::reranker::Reranker;
use crate::vectorstore::HybridStore;

/// Retrieves candidates from a [`HybridStore`] and reorders them with a
/// [`Reranker`]. Construct one via [`HybridSearcher::builder()`].
pub struct HybridSearcher {
    store: Arc<dyn HybridStore>,
    reranker: Arc<dyn Reranker>,
    search_limit: usize,
    reranker_limit: usize,
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RagError::InvalidInput(format!("{what} must not be empty")));
    }
    Ok(())
}

impl HybridSearcher {
    pub fn builder() -> HybridSearcherBuilder {
        HybridSearcherBuilder::default()
    }

    pub fn store(&self) -> &Arc<dyn HybridStore> {
        &self.store
    }

    pub fn search_limit(&self) -> usize {
        self.search_limit
    }

    pub fn reranker_limit(&self) -> usize {
        self.reranker_limit
    }

    /// First-stage hybrid retrieval, normalized to passages.
    ///
    /// `search_limit` defaults to the configured value.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidInput`] for a blank collection name or query,
    /// or a zero limit, before the store is contacted.
    pub async fn search(
        &self,
        collection: &str,
        query: &str,
        search_limit: Option<usize>,
    ) -> Result<Vec<Passage>> {
        require(collection, "collection name")?;
        require(query, "query")?;
        let limit = search_limit.unwrap_or(self.search_limit);
        if limit == 0 {
            return Err(RagError::InvalidInput("search limit must be greater than zero".into()));
        }

        let candidates = self.store.query(collection, query, None, limit).await?;
        info!(collection, hits = candidates.len(), limit, "hybrid search completed");
        Ok(candidates.into_iter().map(|c| c.passage).collect())
    }

    /// Retrieve, render and rerank; returns at most `reranker_limit` rendered
    /// passages, most relevant first.
    pub async fn search_with_rerank(
        &self,
        collection: &str,
        query: &str,
        reranker_limit: Option<usize>,
    ) -> Result<Vec<String>> {
        let limit = reranker_limit.unwrap_or(self.reranker_limit);
        if limit == 0 {
            return Err(RagError::InvalidInput("reranker limit must be greater than zero".into()));
        }
        if limit > self.search_limit {
            warn!(
                reranker_limit = limit,
                search_limit = self.search_limit,
                "reranker limit exceeds search limit; output is capped by the candidate count"
            );
        }

        let passages = self.search(collection, query, None).await?;
        let candidates: Vec<String> = passages.iter().map(Passage::render).collect();
        let candidate_count = candidates.len();
        let ranked = self.reranker.rerank(query, candidates, limit).await?;
        info!(
            collection,
            reranker = self.reranker.name(),
            candidates = candidate_count,
            kept = ranked.len(),
            "rerank completed"
        );
        Ok(ranked)
    }
}

/// Builder for [`HybridSearcher`]. `store` and `reranker` are required.
#[derive(Default)]
pub struct HybridSearcherBuilder {
    store: Option<Arc<dyn HybridStore>>,
    reranker: Option<Arc<dyn Reranker>>,
    search_limit: Option<usize>,
    reranker_limit: Option<usize>,
}

impl HybridSearcherBuilder {
    pub fn store(mut self, store: Arc<dyn HybridStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    pub fn search_limit(mut self, limit: usize) -> Self {
        self.search_limit = Some(limit);
        self
    }

    pub fn reranker_limit(mut self, limit: usize) -> Self {
        self.reranker_limit = Some(limit);
        self
    }

    /// Take both limits from the store settings.
    pub fn limits_from(self, settings: &QdrantSettings) -> Self {
        self.search_limit(settings.search_limit).reranker_limit(settings.reranker_limit)
    }

    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if a required field is missing, a
    /// limit is zero, or `search_limit < reranker_limit`.
    pub fn build(self) -> Result<HybridSearcher> {
        let defaults = QdrantSettings::default();
        let store = self.store.ok_or_else(|| RagError::ConfigError("store is required".to_string()))?;
        let reranker =
            self.reranker.ok_or_else(|| RagError::ConfigError("reranker is required".to_string()))?;
        let search_limit = self.search_limit.unwrap_or(defaults.search_limit);
        let reranker_limit = self.reranker_limit.unwrap_or(defaults.reranker_limit);
        if search_limit == 0 || reranker_limit == 0 {
            return Err(RagError::ConfigError("search and reranker limits must be non-zero".into()));
        }
        if search_limit < reranker_limit {
            return Err(RagError::ConfigError(format!(
                "search_limit ({search_limit}) must be at least reranker_limit ({reranker_limit})"
            )));
        }
        Ok(HybridSearcher { store, reranker, search_limit, reranker_limit })
    }
}
