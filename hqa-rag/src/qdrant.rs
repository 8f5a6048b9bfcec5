//! Qdrant hybrid store backend.
//!
//! Provides [`QdrantHybridStore`], which implements [`HybridStore`] with the
//! [qdrant-client](https://docs.rs/qdrant-client) crate over gRPC. Every
//! collection carries a named dense vector (`dense`, cosine) and a named sparse
//! vector (`sparse`, IDF-weighted). Queries prefetch from both and let the
//! server fuse them with Reciprocal Rank Fusion.
//!
//! # Example
//!
//! ```rust,ignore
//! use hqa_rag::qdrant::QdrantHybridStore;
//!
//! let store = QdrantHybridStore::new("http://localhost:6334", embedder, sparse)?;
//! store.create_collection("demo").await?;
//! let hits = store.query("demo", "capital of France", None, 10).await?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hqa_model::FailureKind;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CreateCollectionBuilder, Distance, Filter, Fusion, Modifier, NamedVectors,
    PointStruct, PrefetchQueryBuilder, Query, QueryPointsBuilder, SparseVectorParamsBuilder,
    SparseVectorsConfigBuilder, UpsertPointsBuilder, Value as QdrantValue, Vector,
    VectorInput, VectorParamsBuilder, VectorsConfigBuilder,
};
use qdrant_client::{Payload, Qdrant, QdrantError};
use serde_json::{Map, Value};
use tracing::{debug, error};

use crate::document::{Passage, RetrievalCandidate};
use crate::embedding::{EmbeddingProvider, SparseEncoder, SparseVector};
use crate::error::{RagError, Result};
use crate::vectorstore::{HybridStore, QueryFilter};

const BACKEND: &str = "qdrant";
pub const DENSE_VECTOR: &str = "dense";
pub const SPARSE_VECTOR: &str = "sparse";

/// A [`HybridStore`] backed by [Qdrant](https://qdrant.tech/).
pub struct QdrantHybridStore {
    client: Qdrant,
    embedder: Arc<dyn EmbeddingProvider>,
    sparse: Arc<dyn SparseEncoder>,
    on_disk_payload: bool,
}

impl QdrantHybridStore {
    /// Connect to the Qdrant gRPC endpoint at `url`.
    pub fn new(
        url: &str,
        embedder: Arc<dyn EmbeddingProvider>,
        sparse: Arc<dyn SparseEncoder>,
    ) -> Result<Self> {
        let client = Qdrant::from_url(url).build().map_err(map_err)?;
        Ok(Self::from_client(client, embedder, sparse))
    }

    /// Wrap an existing client.
    pub fn from_client(
        client: Qdrant,
        embedder: Arc<dyn EmbeddingProvider>,
        sparse: Arc<dyn SparseEncoder>,
    ) -> Self {
        Self { client, embedder, sparse, on_disk_payload: true }
    }

    pub fn with_on_disk_payload(mut self, on_disk: bool) -> Self {
        self.on_disk_payload = on_disk;
        self
    }
}

fn map_err(e: QdrantError) -> RagError {
    let message = e.to_string();
    let lowered = message.to_lowercase();
    if lowered.contains("not found") && lowered.contains("collection") {
        if let Some(name) = message.split('`').nth(1) {
            return RagError::UnknownCollection(name.to_string());
        }
    }
    let kind = if ["transport", "connect", "unavailable", "deadline", "timed out"]
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        FailureKind::Unavailable
    } else {
        FailureKind::Rejected
    };
    error!(backend = BACKEND, error = %message, "qdrant call failed");
    RagError::VectorStoreError { backend: BACKEND.to_string(), message, kind }
}

fn to_filter(filter: &QueryFilter) -> Result<Filter> {
    let conditions = filter
        .must_match
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok(Condition::matches(key.as_str(), s.clone())),
            Value::Bool(b) => Ok(Condition::matches(key.as_str(), *b)),
            Value::Number(n) if n.is_i64() => Ok(Condition::matches(key.as_str(), n.as_i64().unwrap_or_default())),
            other => Err(RagError::InvalidInput(format!(
                "filter on '{key}' must match a string, integer or boolean, got {other}"
            ))),
        })
        .collect::<Result<Vec<Condition>>>()?;
    Ok(Filter::must(conditions))
}

fn to_json(value: QdrantValue) -> Value {
    match value.kind {
        None | Some(Kind::NullValue(_)) => Value::Null,
        Some(Kind::BoolValue(b)) => Value::Bool(b),
        Some(Kind::IntegerValue(i)) => Value::from(i),
        Some(Kind::DoubleValue(d)) => serde_json::Number::from_f64(d).map_or(Value::Null, Value::Number),
        Some(Kind::StringValue(s)) => Value::String(s),
        Some(Kind::ListValue(list)) => Value::Array(list.values.into_iter().map(to_json).collect()),
        Some(Kind::StructValue(st)) => {
            Value::Object(st.fields.into_iter().map(|(k, v)| (k, to_json(v))).collect())
        }
    }
}

/// Pair each passage with its dense and sparse vectors as one point.
fn to_points(batch: &[Passage], dense: Vec<Vec<f32>>, sparse: Vec<SparseVector>) -> Result<Vec<PointStruct>> {
    if dense.len() != batch.len() || sparse.len() != batch.len() {
        return Err(RagError::EmbeddingError {
            provider: BACKEND.to_string(),
            message: format!(
                "encoders returned {} dense and {} sparse vectors for {} inputs",
                dense.len(),
                sparse.len(),
                batch.len()
            ),
        });
    }
    batch
        .iter()
        .zip(dense)
        .zip(sparse)
        .map(|((passage, dense), sparse)| {
            let payload = Payload::try_from(Value::Object(passage.to_payload())).map_err(map_err)?;
            let vectors = NamedVectors::default()
                .add_vector(DENSE_VECTOR, Vector::new_dense(dense))
                .add_vector(SPARSE_VECTOR, Vector::new_sparse(sparse.indices, sparse.values));
            Ok(PointStruct::new(uuid::Uuid::new_v4().to_string(), vectors, payload))
        })
        .collect()
}

fn payload_to_passage(payload: HashMap<String, QdrantValue>) -> Passage {
    let map: Map<String, Value> = payload.into_iter().map(|(k, v)| (k, to_json(v))).collect();
    Passage::from_payload(map)
}

#[async_trait]
impl HybridStore for QdrantHybridStore {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn create_collection(&self, name: &str) -> Result<()> {
        if self.client.collection_exists(name).await.map_err(map_err)? {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!("collection '{name}' already exists"),
                kind: FailureKind::Rejected,
            });
        }

        let dimensions = self.embedder.dimensions() as u64;
        let mut dense = VectorsConfigBuilder::default();
        dense.add_named_vector_params(DENSE_VECTOR, VectorParamsBuilder::new(dimensions, Distance::Cosine));
        let mut sparse = SparseVectorsConfigBuilder::default();
        sparse.add_named_vector_params(
            SPARSE_VECTOR,
            SparseVectorParamsBuilder::default().modifier(Modifier::Idf as i32),
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(dense)
                    .sparse_vectors_config(sparse)
                    .on_disk_payload(self.on_disk_payload),
            )
            .await
            .map_err(map_err)?;

        debug!(collection = name, dimensions, "created qdrant collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let response = self.client.delete_collection(name).await.map_err(map_err)?;
        if !response.result {
            return Err(RagError::UnknownCollection(name.to_string()));
        }
        debug!(collection = name, "deleted qdrant collection");
        Ok(())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let response = self.client.list_collections().await.map_err(map_err)?;
        Ok(response.collections.into_iter().map(|c| c.name).collect())
    }

    async fn add(&self, collection: &str, passages: &[Passage], batch_size: usize) -> Result<usize> {
        if batch_size == 0 {
            return Err(RagError::InvalidInput("batch size must be greater than zero".into()));
        }

        let mut written = 0;
        for batch in passages.chunks(batch_size) {
            let texts: Vec<&str> = batch.iter().map(|p| p.document.as_str()).collect();
            let dense = self.embedder.embed_batch(&texts).await?;
            let sparse = self.sparse.encode_batch(&texts).await?;

            let points = to_points(batch, dense, sparse)?;

            self.client
                .upsert_points(UpsertPointsBuilder::new(collection, points).wait(true))
                .await
                .map_err(map_err)?;
            written += batch.len();
            debug!(collection, batch = batch.len(), total = written, "upserted batch to qdrant");
        }
        Ok(written)
    }

    async fn query(
        &self,
        collection: &str,
        text: &str,
        filter: Option<&QueryFilter>,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate>> {
        let dense = self.embedder.embed(text).await?;
        let sparse = self.sparse.encode(text).await?;
        let filter = filter.filter(|f| !f.is_empty()).map(to_filter).transpose()?;
        let limit = limit as u64;

        let mut dense_prefetch = PrefetchQueryBuilder::default()
            .query(Query::new_nearest(dense))
            .using(DENSE_VECTOR)
            .limit(limit);
        if let Some(filter) = &filter {
            dense_prefetch = dense_prefetch.filter(filter.clone());
        }
        let mut request = QueryPointsBuilder::new(collection).add_prefetch(dense_prefetch);

        if !sparse.is_empty() {
            let mut sparse_prefetch = PrefetchQueryBuilder::default()
                .query(Query::new_nearest(VectorInput::new_sparse(sparse.indices, sparse.values)))
                .using(SPARSE_VECTOR)
                .limit(limit);
            if let Some(filter) = &filter {
                sparse_prefetch = sparse_prefetch.filter(filter.clone());
            }
            request = request.add_prefetch(sparse_prefetch);
        }

        let request = request.query(Query::new_fusion(Fusion::Rrf)).limit(limit).with_payload(true);
        let response = self.client.query(request).await.map_err(map_err)?;
        debug!(collection, hits = response.result.len(), "qdrant hybrid query");

        Ok(response
            .result
            .into_iter()
            .map(|point| RetrievalCandidate { passage: payload_to_passage(point.payload), score: point.score })
            .collect())
    }
}
