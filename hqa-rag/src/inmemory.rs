//! In-memory hybrid store.
//!
//! [`InMemoryHybridStore`] keeps passages with their dense and sparse vectors
//! in a `HashMap` behind a `tokio::sync::RwLock` and fuses the two rankings
//! with Reciprocal Rank Fusion, mirroring what the Qdrant backend asks the
//! server to do. It is suitable for development, tests and small corpora.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::{Passage, RetrievalCandidate};
use crate::embedding::{EmbeddingProvider, SparseEncoder, SparseVector};
use crate::error::{RagError, Result};
use crate::vectorstore::{HybridStore, QueryFilter, RRF_K};

const BACKEND: &str = "in_memory";

struct StoredPassage {
    passage: Passage,
    dense: Vec<f32>,
    sparse: SparseVector,
}

/// An in-memory [`HybridStore`].
///
/// # Example
///
/// ```rust,ignore
/// let store = InMemoryHybridStore::new(Arc::new(embedder), Arc::new(TermFrequencyEncoder));
/// store.create_collection("demo").await?;
/// ```
pub struct InMemoryHybridStore {
    embedder: Arc<dyn EmbeddingProvider>,
    sparse: Arc<dyn SparseEncoder>,
    collections: RwLock<HashMap<String, Vec<StoredPassage>>>,
}

impl InMemoryHybridStore {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, sparse: Arc<dyn SparseEncoder>) -> Self {
        Self { embedder, sparse, collections: RwLock::new(HashMap::new()) }
    }

    /// Number of passages stored in `collection`, if it exists.
    pub async fn len(&self, collection: &str) -> Option<usize> {
        self.collections.read().await.get(collection).map(Vec::len)
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Sort `(position, score)` pairs best first, earlier positions winning ties.
fn rank(mut scored: Vec<(usize, f32)>, limit: usize) -> Vec<usize> {
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
    scored.into_iter().take(limit).map(|(pos, _)| pos).collect()
}

/// Reciprocal Rank Fusion over ranked position lists.
pub(crate) fn reciprocal_rank_fusion(rankings: &[Vec<usize>], limit: usize) -> Vec<(usize, f32)> {
    let mut fused: HashMap<usize, f32> = HashMap::new();
    for ranking in rankings {
        for (rank, pos) in ranking.iter().enumerate() {
            *fused.entry(*pos).or_default() += 1.0 / (RRF_K + rank as f32 + 1.0);
        }
    }
    let mut fused: Vec<(usize, f32)> = fused.into_iter().collect();
    fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
    fused.truncate(limit);
    fused
}

fn missing(collection: &str) -> RagError {
    RagError::UnknownCollection(collection.to_string())
}

#[async_trait]
impl HybridStore for InMemoryHybridStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn create_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(name) {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!("collection '{name}' already exists"),
                kind: hqa_model::FailureKind::Rejected,
            });
        }
        collections.insert(name.to_string(), Vec::new());
        debug!(collection = name, "created in-memory collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name).map(|_| ()).ok_or_else(|| missing(name))
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn add(&self, collection: &str, passages: &[Passage], batch_size: usize) -> Result<usize> {
        if batch_size == 0 {
            return Err(RagError::InvalidInput("batch size must be greater than zero".into()));
        }
        if !self.collections.read().await.contains_key(collection) {
            return Err(missing(collection));
        }

        let mut written = 0;
        for batch in passages.chunks(batch_size) {
            let texts: Vec<&str> = batch.iter().map(|p| p.document.as_str()).collect();
            let dense = self.embedder.embed_batch(&texts).await?;
            let sparse = self.sparse.encode_batch(&texts).await?;
            if dense.len() != batch.len() || sparse.len() != batch.len() {
                return Err(RagError::EmbeddingError {
                    provider: BACKEND.to_string(),
                    message: format!("encoders returned a different count than {} inputs", batch.len()),
                });
            }

            let mut collections = self.collections.write().await;
            let stored = collections.get_mut(collection).ok_or_else(|| missing(collection))?;
            stored.extend(batch.iter().zip(dense).zip(sparse).map(|((passage, dense), sparse)| {
                StoredPassage { passage: passage.clone(), dense, sparse }
            }));
            written += batch.len();
        }
        debug!(collection, count = written, "added passages to in-memory collection");
        Ok(written)
    }

    async fn query(
        &self,
        collection: &str,
        text: &str,
        filter: Option<&QueryFilter>,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate>> {
        let dense_query = self.embedder.embed(text).await?;
        let sparse_query = self.sparse.encode(text).await?;

        let collections = self.collections.read().await;
        let stored = collections.get(collection).ok_or_else(|| missing(collection))?;
        let eligible: Vec<(usize, &StoredPassage)> = stored
            .iter()
            .enumerate()
            .filter(|(_, s)| filter.is_none_or(|f| f.matches(&s.passage.metadata)))
            .collect();

        let dense_ranking = rank(
            eligible.iter().map(|(pos, s)| (*pos, cosine_similarity(&s.dense, &dense_query))).collect(),
            limit,
        );
        let sparse_ranking = rank(
            eligible
                .iter()
                .map(|(pos, s)| (*pos, s.sparse.dot(&sparse_query)))
                .filter(|(_, score)| *score > 0.0)
                .collect(),
            limit,
        );

        Ok(reciprocal_rank_fusion(&[dense_ranking, sparse_ranking], limit)
            .into_iter()
            .map(|(pos, score)| RetrievalCandidate { passage: stored[pos].passage.clone(), score })
            .collect())
    }
}
