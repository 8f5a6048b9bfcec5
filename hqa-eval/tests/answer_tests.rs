use std::sync::Arc;

use async_trait::async_trait;
use hqa_eval::{EvalRecord, answer_testset, load_records, save_records, unanswered};
use hqa_model::{MockChatModel, MockProviderFactory};
use hqa_rag::{
    EmbeddingProvider, HybridSearcher, HybridStore, InMemoryHybridStore, LlmSettings,
    PassthroughReranker, Passage, QaChain, TermFrequencyEncoder,
};
use tempfile::TempDir;

struct LengthEmbedder;

#[async_trait]
impl EmbeddingProvider for LengthEmbedder {
    async fn embed(&self, text: &str) -> hqa_rag::Result<Vec<f32>> {
        Ok(vec![1.0, text.len() as f32])
    }

    fn dimensions(&self) -> usize {
        2
    }
}

async fn chain(model: MockChatModel) -> QaChain {
    let store = Arc::new(InMemoryHybridStore::new(Arc::new(LengthEmbedder), Arc::new(TermFrequencyEncoder)));
    store.create_collection("demo").await.unwrap();
    store
        .add(
            "demo",
            &[
                Passage::new("Paris is the capital of France.", Default::default()),
                Passage::new("Madrid is the capital of Spain.", Default::default()),
            ],
            8,
        )
        .await
        .unwrap();
    let searcher = HybridSearcher::builder()
        .store(store)
        .reranker(Arc::new(PassthroughReranker))
        .search_limit(2)
        .reranker_limit(1)
        .build()
        .unwrap();
    QaChain::new(Arc::new(searcher), LlmSettings::default(), Arc::new(MockProviderFactory::new(model)))
}

#[tokio::test]
async fn test_answer_testset_fills_answers_and_contexts() {
    let model = MockChatModel::new("fallback");
    model.push_reply("Paris.");
    model.push_reply("Madrid.");
    let chain = chain(model).await;

    let questions = vec![
        EvalRecord::new("What is the capital of France?", "Paris"),
        EvalRecord::new("What is the capital of Spain?", "Madrid"),
    ];
    let answered = answer_testset(&chain, "demo", questions).await.unwrap();

    assert_eq!(answered.len(), 2);
    assert_eq!(answered[0].answer.as_deref(), Some("Paris."));
    assert_eq!(answered[1].answer.as_deref(), Some("Madrid."));
    assert_eq!(answered[0].ground_truth, "Paris");
    assert_eq!(answered[0].contexts.len(), 1);
    assert!(answered[0].contexts[0].starts_with("document: "));

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("answers.csv");
    save_records(&path, &answered).unwrap();
    assert_eq!(load_records(&path).unwrap(), answered);
}

#[tokio::test]
async fn test_answer_testset_keeps_going_past_provider_failures() {
    let model = MockChatModel::new("fallback");
    model.push_reply("Paris.");
    model.push_failure("provider down");
    model.push_reply("Madrid.");
    let chain = chain(model.clone()).await;

    let questions = vec![
        EvalRecord::new("What is the capital of France?", "Paris"),
        EvalRecord::new("What is the capital of Germany?", "Berlin"),
        EvalRecord::new("What is the capital of Spain?", "Madrid"),
    ];
    let answered = answer_testset(&chain, "demo", questions).await.unwrap();

    let answers: Vec<Option<&str>> = answered.iter().map(|r| r.answer.as_deref()).collect();
    assert_eq!(answers, vec![Some("Paris."), None, Some("Madrid.")]);
    assert_eq!(answered[1].ground_truth, "Berlin");
    assert_eq!(unanswered(&answered), 1);
    assert_eq!(model.calls().len(), 3);
}

#[tokio::test]
async fn test_answer_testset_aborts_on_unsupported_provider() {
    let model = MockChatModel::new("fallback");
    let store = Arc::new(InMemoryHybridStore::new(Arc::new(LengthEmbedder), Arc::new(TermFrequencyEncoder)));
    store.create_collection("demo").await.unwrap();
    let searcher = HybridSearcher::builder()
        .store(store)
        .reranker(Arc::new(PassthroughReranker))
        .search_limit(2)
        .reranker_limit(1)
        .build()
        .unwrap();
    let llm = LlmSettings { provider: "mistral".into(), ..LlmSettings::default() };
    let chain = QaChain::new(Arc::new(searcher), llm, Arc::new(MockProviderFactory::new(model.clone())));

    let err = answer_testset(&chain, "demo", vec![EvalRecord::new("q?", "t"), EvalRecord::new("r?", "u")])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("mistral"));
    assert!(model.calls().is_empty());
}

#[tokio::test]
async fn test_answer_testset_aborts_on_unknown_collection() {
    let chain = chain(MockChatModel::new("fallback")).await;
    let err = answer_testset(&chain, "ghost", vec![EvalRecord::new("q?", "t")]).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}
