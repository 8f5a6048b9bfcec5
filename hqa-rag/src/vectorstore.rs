//! Hybrid vector store trait.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Metadata, Passage, RetrievalCandidate};
use crate::error::Result;

/// Rank constant for Reciprocal Rank Fusion.
pub const RRF_K: f32 = 60.0;

/// Exact-match conditions on passage metadata, all of which must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub must_match: BTreeMap<String, Value>,
}

impl QueryFilter {
    pub fn is_empty(&self) -> bool {
        self.must_match.is_empty()
    }

    pub fn matches(&self, metadata: &Metadata) -> bool {
        self.must_match.iter().all(|(k, v)| metadata.get(k) == Some(v))
    }
}

/// A store that indexes every passage with a dense and a sparse vector and
/// answers text queries by fusing both rankings.
///
/// Implementations own their encoders: callers hand over text, never vectors.
/// Each collection is created with the same process-wide dense and sparse
/// configuration.
///
/// # Example
///
/// ```rust,ignore
/// store.create_collection("demo").await?;
/// store.add("demo", &passages, 64).await?;
/// let hits = store.query("demo", "capital of France", None, 10).await?;
/// ```
#[async_trait]
pub trait HybridStore: Send + Sync {
    /// Short backend name used in logs and errors.
    fn backend(&self) -> &str;

    /// Create a named collection. Fails if it already exists.
    async fn create_collection(&self, name: &str) -> Result<()>;

    /// Delete a named collection and all its points.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Names of every collection the store currently holds.
    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Encode and insert `passages`, `batch_size` at a time. Returns the
    /// number of passages written.
    async fn add(&self, collection: &str, passages: &[Passage], batch_size: usize) -> Result<usize>;

    /// Return at most `limit` candidates ordered by fused relevance, best first.
    async fn query(
        &self,
        collection: &str,
        text: &str,
        filter: Option<&QueryFilter>,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_requires_every_condition() {
        let mut metadata = Metadata::new();
        metadata.insert("title".into(), json!("France"));
        metadata.insert("year".into(), json!(2020));

        let mut filter = QueryFilter::default();
        assert!(filter.matches(&metadata));
        filter.must_match.insert("title".into(), json!("France"));
        assert!(filter.matches(&metadata));
        filter.must_match.insert("year".into(), json!(2021));
        assert!(!filter.matches(&metadata));
    }
}
