//! End-to-end ingestion, hybrid search and rerank over the in-memory store.

mod common;

use std::sync::Arc;

use common::{OverlapEncoder, demo_files, in_memory_store};
use hqa_rag::{
    CollectionRegistry, CrossEncoderReranker, HybridSearcher, HybridStore, PassthroughReranker,
    QueryFilter, RagError,
};
use serde_json::json;
use tempfile::TempDir;

#[tokio::test]
async fn test_capital_of_france_ranks_paris_first() {
    let dir = TempDir::new().unwrap();
    let store = in_memory_store();
    let registry =
        CollectionRegistry::load(dir.path().join("collections.json"), store.clone(), 2).await.unwrap();

    registry.create_collection("demo").await.unwrap();
    let written = registry
        .add_data_to_collection("demo", &demo_files(dir.path()), "body", &["title".to_string()], None)
        .await
        .unwrap();
    assert_eq!(written, 5);
    assert_eq!(store.len("demo").await, Some(5));

    let searcher = HybridSearcher::builder()
        .store(store)
        .reranker(Arc::new(PassthroughReranker))
        .search_limit(5)
        .reranker_limit(3)
        .build()
        .unwrap();

    let passages = searcher.search("demo", "capital of France", None).await.unwrap();
    assert_eq!(passages.len(), 5);
    assert_eq!(passages[0].document, "Paris is the capital of France.");
    assert_eq!(passages[0].metadata.get("title"), Some(&json!("France")));
    assert_eq!(passages[0].metadata.len(), 1);
}

#[tokio::test]
async fn test_rerank_keeps_three_of_five_including_paris() {
    let dir = TempDir::new().unwrap();
    let store = in_memory_store();
    let registry =
        CollectionRegistry::load(dir.path().join("collections.json"), store.clone(), 64).await.unwrap();
    registry.create_collection("demo").await.unwrap();
    registry
        .add_data_to_collection("demo", &demo_files(dir.path()), "body", &["title".to_string()], None)
        .await
        .unwrap();

    let searcher = HybridSearcher::builder()
        .store(store)
        .reranker(Arc::new(CrossEncoderReranker::new(Arc::new(OverlapEncoder), "overlap")))
        .search_limit(5)
        .reranker_limit(3)
        .build()
        .unwrap();

    let ranked = searcher.search_with_rerank("demo", "capital of France", None).await.unwrap();
    assert_eq!(ranked.len(), 3);
    assert!(ranked[0].starts_with("document: Paris is the capital of France.\n"));
    assert!(ranked[0].ends_with("'title': 'France'"));
}

#[tokio::test]
async fn test_search_validates_before_querying() {
    let store = in_memory_store();
    let searcher = HybridSearcher::builder()
        .store(store)
        .reranker(Arc::new(PassthroughReranker))
        .build()
        .unwrap();

    for (collection, query, limit) in [("", "q", None), ("demo", "  ", None), ("demo", "q", Some(0))] {
        let err = searcher.search(collection, query, limit).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)), "{collection:?} {query:?} {limit:?}");
    }

    // no validation failure: the store itself reports the missing collection
    let err = searcher.search("demo", "q", None).await.unwrap_err();
    assert!(matches!(err, RagError::UnknownCollection(_)));
}

#[tokio::test]
async fn test_filter_restricts_candidates() {
    let dir = TempDir::new().unwrap();
    let store = in_memory_store();
    store.create_collection("demo").await.unwrap();
    let table = hqa_rag::read_and_concatenate(&demo_files(dir.path())).unwrap();
    let passages = hqa_rag::passages_from_table(&table, "body", &["title".to_string()]).unwrap();
    store.add("demo", &passages, 3).await.unwrap();

    let mut filter = QueryFilter::default();
    filter.must_match.insert("title".into(), json!("Italy"));
    let hits = store.query("demo", "capital of France", Some(&filter), 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].passage.document, "Rome is the capital of Italy.");
}

#[test]
fn test_builder_rejects_inconsistent_limits() {
    let err = HybridSearcher::builder()
        .store(in_memory_store())
        .reranker(Arc::new(PassthroughReranker))
        .search_limit(2)
        .reranker_limit(3)
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, RagError::ConfigError(_)));

    let err = HybridSearcher::builder().reranker(Arc::new(PassthroughReranker)).build().err().unwrap();
    assert!(matches!(err, RagError::ConfigError(_)));
}
