//! Local ONNX models via [fastembed](https://docs.rs/fastembed).
//!
//! Three wrappers, each selected by its Hugging Face model code:
//! [`FastembedDense`] (dense embeddings), [`FastembedSparse`] (SPLADE-style
//! sparse vectors) and [`FastembedCrossEncoder`] (pairwise relevance).
//! The underlying sessions need `&mut self`, so each sits behind a mutex.

use std::sync::Mutex;

use async_trait::async_trait;
use ::fastembed::{
    EmbeddingModel, InitOptions, RerankInitOptions, RerankerModel, SparseInitOptions, SparseModel,
    SparseTextEmbedding, TextEmbedding, TextRerank,
};
use tracing::debug;

use crate::embedding::{EmbeddingProvider, SparseEncoder, SparseVector};
use crate::error::{RagError, Result};
use crate::reranker::CrossEncoder;

const PROVIDER: &str = "fastembed";

fn embedding_error(message: impl Into<String>) -> RagError {
    RagError::EmbeddingError { provider: PROVIDER.to_string(), message: message.into() }
}

fn unknown_model(code: &str) -> RagError {
    RagError::ConfigError(format!("fastembed does not support model '{code}'"))
}

/// Dense sentence embeddings.
pub struct FastembedDense {
    model: Mutex<TextEmbedding>,
    dimensions: usize,
}

impl FastembedDense {
    /// Load the model with the given code, e.g. `sentence-transformers/all-MiniLM-L6-v2`.
    pub fn new(model_code: &str) -> Result<Self> {
        let info = TextEmbedding::list_supported_models()
            .into_iter()
            .find(|info| info.model_code == model_code)
            .ok_or_else(|| unknown_model(model_code))?;
        let model: EmbeddingModel = info.model.clone();
        let session = TextEmbedding::try_new(InitOptions::new(model))
            .map_err(|e| embedding_error(format!("failed to load '{model_code}': {e}")))?;
        debug!(model = model_code, dimensions = info.dim, "loaded dense model");
        Ok(Self { model: Mutex::new(session), dimensions: info.dim })
    }
}

#[async_trait]
impl EmbeddingProvider for FastembedDense {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| embedding_error("model returned no embedding"))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut model = self.model.lock().map_err(|_| embedding_error("model lock poisoned"))?;
        model.embed(texts.to_vec(), None).map_err(|e| embedding_error(e.to_string()))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Sparse lexical vectors (e.g. `prithivida/Splade_PP_en_v1`).
pub struct FastembedSparse {
    model: Mutex<SparseTextEmbedding>,
}

impl FastembedSparse {
    pub fn new(model_code: &str) -> Result<Self> {
        let model: SparseModel = SparseTextEmbedding::list_supported_models()
            .into_iter()
            .find(|info| info.model_code == model_code)
            .map(|info| info.model)
            .ok_or_else(|| unknown_model(model_code))?;
        let session = SparseTextEmbedding::try_new(SparseInitOptions::new(model))
            .map_err(|e| embedding_error(format!("failed to load '{model_code}': {e}")))?;
        debug!(model = model_code, "loaded sparse model");
        Ok(Self { model: Mutex::new(session) })
    }
}

#[async_trait]
impl SparseEncoder for FastembedSparse {
    async fn encode(&self, text: &str) -> Result<SparseVector> {
        self.encode_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| embedding_error("model returned no sparse vector"))
    }

    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<SparseVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut model = self.model.lock().map_err(|_| embedding_error("model lock poisoned"))?;
        let embeddings =
            model.embed(texts.to_vec(), None).map_err(|e| embedding_error(e.to_string()))?;
        Ok(embeddings
            .into_iter()
            .map(|e| {
                let mut pairs: Vec<(u32, f32)> =
                    e.indices.into_iter().map(|i| i as u32).zip(e.values).collect();
                pairs.sort_by_key(|(i, _)| *i);
                let (indices, values) = pairs.into_iter().unzip();
                SparseVector { indices, values }
            })
            .collect())
    }
}

/// Cross-encoder relevance, squashed to `0..1` with a sigmoid.
pub struct FastembedCrossEncoder {
    model: Mutex<TextRerank>,
    name: String,
}

impl FastembedCrossEncoder {
    /// Load a reranker such as `BAAI/bge-reranker-base`.
    pub fn new(model_code: &str) -> Result<Self> {
        let model: RerankerModel = TextRerank::list_supported_models()
            .into_iter()
            .find(|info| info.model_code == model_code)
            .map(|info| info.model)
            .ok_or_else(|| unknown_model(model_code))?;
        let session = TextRerank::try_new(RerankInitOptions::new(model)).map_err(|e| {
            RagError::RerankerError {
                reranker: PROVIDER.to_string(),
                message: format!("failed to load '{model_code}': {e}"),
                kind: hqa_model::FailureKind::Rejected,
            }
        })?;
        debug!(model = model_code, "loaded cross-encoder");
        Ok(Self { model: Mutex::new(session), name: model_code.to_string() })
    }

    fn rerank_error(&self, message: impl Into<String>) -> RagError {
        RagError::RerankerError {
            reranker: self.name.clone(),
            message: message.into(),
            kind: hqa_model::FailureKind::Rejected,
        }
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[async_trait]
impl CrossEncoder for FastembedCrossEncoder {
    async fn score(&self, query: &str, document: &str) -> Result<f32> {
        self.score_all(query, &[document.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| self.rerank_error("model returned no score"))
    }

    async fn score_all(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }
        let docs: Vec<&str> = documents.iter().map(String::as_str).collect();
        let mut model = self.model.lock().map_err(|_| self.rerank_error("model lock poisoned"))?;
        let results =
            model.rerank(query, docs, false, None).map_err(|e| self.rerank_error(e.to_string()))?;

        // Results come back sorted by score; restore input order.
        let mut scores = vec![f32::NEG_INFINITY; documents.len()];
        for result in results {
            let slot = scores
                .get_mut(result.index)
                .ok_or_else(|| self.rerank_error(format!("index {} out of range", result.index)))?;
            *slot = sigmoid(result.score);
        }
        Ok(scores)
    }
}
