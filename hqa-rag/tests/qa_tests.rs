mod common;

use std::sync::Arc;

use common::{OverlapEncoder, RecordingStore, demo_files};
use hqa_model::{MockChatModel, MockProviderFactory, ModelError, ProviderKind, Role};
use hqa_rag::{
    CollectionRegistry, CrossEncoderReranker, HybridSearcher, LlmOverrides, LlmSettings, QaChain,
    RagError,
};
use tempfile::TempDir;

async fn chain(dir: &TempDir, model: MockChatModel) -> (QaChain, Arc<RecordingStore>, MockProviderFactory) {
    let store = Arc::new(RecordingStore::new());
    let registry =
        CollectionRegistry::load(dir.path().join("collections.json"), store.clone(), 64).await.unwrap();
    registry.create_collection("demo").await.unwrap();
    registry
        .add_data_to_collection("demo", &demo_files(dir.path()), "body", &["title".to_string()], None)
        .await
        .unwrap();

    let searcher = HybridSearcher::builder()
        .store(store.clone())
        .reranker(Arc::new(CrossEncoderReranker::new(Arc::new(OverlapEncoder), "overlap")))
        .search_limit(5)
        .reranker_limit(2)
        .build()
        .unwrap();
    let factory = MockProviderFactory::new(model);
    let llm = LlmSettings {
        prompt: "Answer briefly.".into(),
        model: "command-r".into(),
        provider: "cohere".into(),
    };
    (QaChain::new(Arc::new(searcher), llm, Arc::new(factory.clone())), store, factory)
}

#[tokio::test]
async fn test_qa_chain_builds_three_messages() {
    let dir = TempDir::new().unwrap();
    let model = MockChatModel::new("Paris.");
    let (chain, _store, factory) = chain(&dir, model.clone()).await;

    let result = chain.qa_chain("demo", "capital of France", &LlmOverrides::default()).await.unwrap();
    assert_eq!(result.question, "capital of France");
    assert_eq!(result.answer, "Paris.");
    let contexts = result.contexts();
    assert_eq!(contexts.len(), 2);
    assert!(contexts[0].starts_with("document: Paris"));

    let calls = model.calls();
    assert_eq!(calls.len(), 1);
    let messages = &calls[0];
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].role, Role::System);
    assert_eq!(messages[0].content, "Answer briefly.");
    assert_eq!(messages[1].role, Role::User);
    assert_eq!(messages[1].content, "Question: capital of France");
    assert_eq!(messages[2].content, format!("Contexts: {}", result.context));

    assert_eq!(factory.requests(), vec![(ProviderKind::Cohere, "command-r".to_string())]);
}

#[tokio::test]
async fn test_overrides_select_provider_and_model_per_call() {
    let dir = TempDir::new().unwrap();
    let model = MockChatModel::new("ok");
    let (chain, _store, factory) = chain(&dir, model.clone()).await;

    chain
        .answer_question(
            "demo",
            "capital of France",
            Some("Be terse.".into()),
            Some("gpt-4o".into()),
            Some("azure_openai".into()),
        )
        .await
        .unwrap();
    chain.answer_question("demo", "capital of France", None, None, None).await.unwrap();

    assert_eq!(
        factory.requests(),
        vec![
            (ProviderKind::AzureOpenai, "gpt-4o".to_string()),
            (ProviderKind::Cohere, "command-r".to_string()),
        ]
    );
    assert_eq!(model.calls()[0][0].content, "Be terse.");
    assert_eq!(model.calls()[1][0].content, "Answer briefly.");
}

#[tokio::test]
async fn test_unsupported_provider_fails_before_retrieval() {
    let dir = TempDir::new().unwrap();
    let (chain, store, factory) = chain(&dir, MockChatModel::new("unused")).await;
    let calls_before = store.calls().len();

    let err = chain
        .answer_question("demo", "capital of France", None, None, Some("unsupported".into()))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Model(ModelError::UnsupportedProvider(ref p)) if p == "unsupported"));
    assert_eq!(err.status_code(), 400);
    assert_eq!(store.calls().len(), calls_before);
    assert!(factory.requests().is_empty());
}

#[tokio::test]
async fn test_provider_failure_propagates_unchanged() {
    let dir = TempDir::new().unwrap();
    let model = MockChatModel::new("unused");
    model.push_failure("quota exceeded");
    let (chain, _store, _factory) = chain(&dir, model).await;

    let err = chain.qa_chain("demo", "capital of France", &LlmOverrides::default()).await.unwrap_err();
    assert!(err.is_provider_error());
    assert!(err.to_string().contains("quota exceeded"));
}
