//! # hqa-rag
//!
//! Hybrid retrieval, reranking and grounded answering.
//!
//! ## Overview
//!
//! - [`CollectionRegistry`] creates and deletes collections and records which
//!   files were ingested into each, persisting a small JSON document.
//! - [`read_and_concatenate`] and [`passages_from_table`] turn CSV, Excel/ODS,
//!   HTML and Parquet tables into [`Passage`]s.
//! - A [`HybridStore`] indexes each passage with a dense and a sparse vector and
//!   fuses both rankings at query time.
//! - [`HybridSearcher`] retrieves candidates and reorders them with a
//!   [`Reranker`] (local cross-encoder, Cohere's hosted API, or passthrough).
//! - [`QaChain`] sends the reranked context to a chat provider from
//!   [`hqa_model`] and returns a [`QaResult`].
//!
//! ## Features
//!
//! - `qdrant` - [`QdrantHybridStore`](qdrant::QdrantHybridStore)
//! - `fastembed` - local dense, sparse and cross-encoder models
//! - `full` - everything
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hqa_rag::*;
//!
//! let store: Arc<dyn HybridStore> =
//!     Arc::new(InMemoryHybridStore::new(Arc::new(embedder), Arc::new(TermFrequencyEncoder)));
//! let registry = CollectionRegistry::load("qdrant_collections.json", store.clone(), 64).await?;
//! registry.create_collection("demo").await?;
//! registry
//!     .add_data_to_collection("demo", &["facts.csv"], "body", &["title".to_string()], None)
//!     .await?;
//!
//! let searcher = HybridSearcher::builder()
//!     .store(store)
//!     .reranker(Arc::new(PassthroughReranker))
//!     .build()?;
//! let chain = QaChain::new(Arc::new(searcher), LlmSettings::default(), factory);
//! let result = chain.answer_question("demo", "What is the capital of France?", None, None, None).await?;
//! ```

pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod indexer;
pub mod inmemory;
pub mod openai;
pub mod qa;
pub mod registry;
pub mod reranker;
pub mod retriever;
pub mod tabular;
pub mod vectorstore;

#[cfg(feature = "fastembed")]
pub mod fastembed;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use config::{
    EmbeddingBackend, EvalSettings, HttpSettings, LlmOverrides, LlmSettings, QdrantSettings,
    RerankerKind, RerankerSettings, Settings, overlay_value,
};
pub use document::{Metadata, Passage, RetrievalCandidate};
pub use embedding::{EmbeddingProvider, SparseEncoder, SparseVector, TermFrequencyEncoder};
pub use error::{RagError, Result};
pub use indexer::passages_from_table;
pub use inmemory::InMemoryHybridStore;
pub use openai::OpenAIEmbeddingProvider;
pub use qa::{QaChain, QaResult};
pub use registry::{CollectionRegistry, Reconciliation};
pub use reranker::{CohereReranker, CrossEncoder, CrossEncoderReranker, PassthroughReranker, Reranker};
pub use retriever::{HybridSearcher, HybridSearcherBuilder};
pub use tabular::{Table, TableFormat, read_and_concatenate, read_table};
pub use vectorstore::{HybridStore, QueryFilter};
