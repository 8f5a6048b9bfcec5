//! Dense and sparse text encoders.
//!
//! Hybrid retrieval needs two representations of every passage: a dense
//! embedding from an [`EmbeddingProvider`] and a lexical [`SparseVector`] from
//! a [`SparseEncoder`]. Both are black boxes to the rest of the crate.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A provider that generates dense vector embeddings from text input.
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch) implementation
/// calls [`embed`](EmbeddingProvider::embed) sequentially; backends that
/// support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use hqa_rag::EmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::new("sk-...")?;
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// A sparse vector: parallel index and weight lists, indices ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Dot product with another sparse vector. Both must have ascending indices.
    pub fn dot(&self, other: &SparseVector) -> f32 {
        let (mut i, mut j, mut sum) = (0, 0, 0.0);
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }
}

/// A lexical encoder producing [`SparseVector`]s (SPLADE, BM25-style, ...).
#[async_trait]
pub trait SparseEncoder: Send + Sync {
    async fn encode(&self, text: &str) -> Result<SparseVector>;

    async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<SparseVector>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.encode(text).await?);
        }
        Ok(results)
    }
}

/// Hashed term-frequency encoder.
///
/// Lowercased alphanumeric tokens are hashed into the `u32` index space and
/// weighted by their count in the text. Inverse document frequency is left to
/// the store (Qdrant applies it when the sparse vector uses the IDF modifier).
#[derive(Debug, Clone, Copy, Default)]
pub struct TermFrequencyEncoder;

impl TermFrequencyEncoder {
    pub fn encode_sync(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<u32, f32> = BTreeMap::new();
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
        {
            *counts.entry(fnv1a(&token)).or_default() += 1.0;
        }
        SparseVector { indices: counts.keys().copied().collect(), values: counts.into_values().collect() }
    }
}

#[async_trait]
impl SparseEncoder for TermFrequencyEncoder {
    async fn encode(&self, text: &str) -> Result<SparseVector> {
        Ok(self.encode_sync(text))
    }
}

fn fnv1a(token: &str) -> u32 {
    token.bytes().fold(0x811c_9dc5u32, |hash, byte| (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn term_frequencies_are_case_insensitive() {
        let v = TermFrequencyEncoder.encode_sync("Paris, paris and PARIS!");
        assert_eq!(v.indices.len(), 2);
        assert!(v.indices.windows(2).all(|w| w[0] < w[1]));
        assert!(v.values.contains(&3.0));
        assert!(v.values.contains(&1.0));
    }

    #[test]
    fn dot_counts_shared_terms_only() {
        let enc = TermFrequencyEncoder;
        let doc = enc.encode_sync("the capital of France is Paris");
        let query = enc.encode_sync("capital of France");
        assert_eq!(doc.dot(&query), 3.0);
        assert_eq!(doc.dot(&enc.encode_sync("Berlin")), 0.0);
        assert!(enc.encode_sync("  ,, ").is_empty());
    }
}
