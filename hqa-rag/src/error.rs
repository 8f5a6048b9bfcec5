//! Error types for the `hqa-rag` crate.

use std::path::PathBuf;

use hqa_model::{FailureKind, ModelError};
use thiserror::Error;

/// Errors that can occur in retrieval, ingestion and answer orchestration.
#[derive(Debug, Error)]
pub enum RagError {
    /// Caller-supplied arguments have the wrong shape (blank names, zero limits,
    /// unknown fields, unsupported file types).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The collection is not present in the registry.
    #[error("Unknown collection: '{0}'")]
    UnknownCollection(String),

    /// Ingestion inputs do not share the same column set.
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A tabular input file could not be parsed.
    #[error("Failed to read table '{}': {message}", path.display())]
    TableError {
        /// The offending file.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
        /// How the call failed.
        kind: FailureKind,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during result reranking.
    #[error("Reranker error ({reranker}): {message}")]
    RerankerError {
        /// The reranker that produced the error.
        reranker: String,
        /// A description of the failure.
        message: String,
        /// How the call failed.
        kind: FailureKind,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Reading or writing local state failed.
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        /// The file being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// An error propagated from a chat provider.
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl RagError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn table(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::TableError { path: path.into(), message: message.into() }
    }

    /// Whether this error came from a downstream service call
    /// (vector store, embedding, rerank or chat provider).
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Self::VectorStoreError { .. }
                | Self::EmbeddingError { .. }
                | Self::RerankerError { .. }
                | Self::Model(ModelError::Provider { .. })
        )
    }

    /// HTTP status a front-end should report for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::SchemaMismatch(_) | Self::TableError { .. } => 400,
            Self::UnknownCollection(_) => 404,
            Self::VectorStoreError { kind, .. } | Self::RerankerError { kind, .. } => {
                kind.status_code()
            }
            Self::EmbeddingError { .. } | Self::ConfigError(_) | Self::Io { .. } => 500,
            Self::Model(e) => e.status_code(),
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
