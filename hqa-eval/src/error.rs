//! Error types for the `hqa-eval` crate.

use std::path::PathBuf;

use hqa_model::ModelError;
use hqa_rag::RagError;
use thiserror::Error;

/// Errors that can occur while answering or scoring a question set.
#[derive(Debug, Error)]
pub enum EvalError {
    /// The row count cannot be split into equal chunks.
    #[error("Cannot split {rows} rows into {chunks} equal chunks")]
    InvalidChunking { rows: usize, chunks: usize },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A metric scorer failed or returned an unusable score.
    #[error("Metric '{metric}' failed: {message}")]
    Metric { metric: String, message: String },

    #[error(transparent)]
    Rag(#[from] RagError),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error on '{}': {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl From<ModelError> for EvalError {
    fn from(e: ModelError) -> Self {
        Self::Rag(RagError::Model(e))
    }
}

impl EvalError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidChunking { .. } | Self::InvalidInput(_) => 400,
            Self::Rag(e) => e.status_code(),
            Self::Metric { .. } | Self::Io { .. } | Self::Csv { .. } => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
