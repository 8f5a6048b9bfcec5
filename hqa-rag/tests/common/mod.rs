//! Shared fixtures for hqa-rag integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use hqa_rag::document::{Passage, RetrievalCandidate};
use hqa_rag::embedding::{EmbeddingProvider, TermFrequencyEncoder};
use hqa_rag::error::Result;
use hqa_rag::inmemory::InMemoryHybridStore;
use hqa_rag::reranker::CrossEncoder;
use hqa_rag::vectorstore::{HybridStore, QueryFilter};

pub const DIM: usize = 256;

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()).map(str::to_lowercase)
}

/// Bag-of-words embedder: each token bumps one hashed bucket.
pub struct HashingEmbedder;

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0; DIM];
        for token in tokens(text) {
            let bucket = token.bytes().fold(7usize, |h, b| h.wrapping_mul(31).wrapping_add(b as usize));
            v[bucket % DIM] += 1.0;
        }
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        DIM
    }
}

/// Scores a document by how many query tokens it contains.
pub struct OverlapEncoder;

#[async_trait]
impl CrossEncoder for OverlapEncoder {
    async fn score(&self, query: &str, document: &str) -> Result<f32> {
        let doc: Vec<String> = tokens(document).collect();
        Ok(tokens(query).filter(|t| doc.contains(t)).count() as f32)
    }
}

pub fn in_memory_store() -> Arc<InMemoryHybridStore> {
    Arc::new(InMemoryHybridStore::new(Arc::new(HashingEmbedder), Arc::new(TermFrequencyEncoder)))
}

/// A [`HybridStore`] that records every call it receives before delegating.
pub struct RecordingStore {
    inner: Arc<InMemoryHybridStore>,
    calls: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self { inner: in_memory_store(), calls: Mutex::new(Vec::new()) }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl HybridStore for RecordingStore {
    fn backend(&self) -> &str {
        "recording"
    }

    async fn create_collection(&self, name: &str) -> Result<()> {
        self.record(format!("create:{name}"));
        self.inner.create_collection(name).await
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.record(format!("delete:{name}"));
        self.inner.delete_collection(name).await
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.record("list");
        self.inner.list_collections().await
    }

    async fn add(&self, collection: &str, passages: &[Passage], batch_size: usize) -> Result<usize> {
        self.record(format!("add:{collection}:{}", passages.len()));
        self.inner.add(collection, passages, batch_size).await
    }

    async fn query(
        &self,
        collection: &str,
        text: &str,
        filter: Option<&QueryFilter>,
        limit: usize,
    ) -> Result<Vec<RetrievalCandidate>> {
        self.record(format!("query:{collection}"));
        self.inner.query(collection, text, filter, limit).await
    }
}

pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

/// The two-file "demo" corpus with `body` and `title` columns.
pub fn demo_files(dir: &Path) -> Vec<PathBuf> {
    vec![
        write_file(
            dir,
            "europe.csv",
            "body,title\n\
             Paris is the capital of France.,France\n\
             Berlin is the capital of Germany.,Germany\n\
             Madrid is the capital of Spain.,Spain\n",
        ),
        write_file(
            dir,
            "more.csv",
            "body,title\n\
             Rome is the capital of Italy.,Italy\n\
             Tokyo is the largest city in Japan.,Japan\n",
        ),
    ]
}
