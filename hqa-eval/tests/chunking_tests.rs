use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hqa_eval::{
    ChunkedEvaluator, EvalError, EvalRecord, IntervalLimiter, Metric, MetricScorer, NoDelay,
    RateLimiter, Result, metric_means,
};

/// Records every chunk it sees and scores each row by its position.
#[derive(Default)]
struct RecordingScorer {
    chunks: Mutex<Vec<Vec<String>>>,
    fail_on_call: Option<usize>,
}

#[async_trait]
impl MetricScorer for RecordingScorer {
    async fn score(&self, records: &[EvalRecord], metrics: &[Metric]) -> Result<Vec<BTreeMap<String, f64>>> {
        let call = {
            let mut chunks = self.chunks.lock().unwrap();
            chunks.push(records.iter().map(|r| r.question.clone()).collect());
            chunks.len()
        };
        if self.fail_on_call == Some(call) {
            return Err(EvalError::Metric { metric: "answer_correctness".into(), message: "rate limited".into() });
        }
        Ok(records
            .iter()
            .map(|r| {
                let value: f64 = r.question.trim_start_matches('q').parse::<f64>().unwrap() / 10.0;
                metrics.iter().map(|m| (m.to_string(), value)).collect()
            })
            .collect())
    }
}

#[derive(Default)]
struct CountingLimiter {
    waits: AtomicUsize,
}

#[async_trait]
impl RateLimiter for CountingLimiter {
    async fn wait(&self) {
        self.waits.fetch_add(1, Ordering::SeqCst);
    }
}

fn records(n: usize) -> Vec<EvalRecord> {
    (0..n)
        .map(|i| {
            let mut r = EvalRecord::new(format!("q{i}"), format!("truth {i}"));
            if i % 3 != 0 {
                r.answer = Some(format!("answer {i}"));
            }
            r
        })
        .collect()
}

fn metrics() -> Vec<String> {
    vec!["answer_correctness".to_string(), "context_recall".to_string()]
}

#[tokio::test]
async fn test_ten_rows_in_five_chunks_of_two() {
    let scorer = Arc::new(RecordingScorer::default());
    let limiter = Arc::new(CountingLimiter::default());
    let evaluator = ChunkedEvaluator::new(scorer.clone(), limiter.clone());

    let scored = evaluator.evaluate_in_chunks(records(10), &metrics(), 5).await.unwrap();

    assert_eq!(scored.len(), 10);
    let questions: Vec<&str> = scored.iter().map(|r| r.question.as_str()).collect();
    assert_eq!(questions, ["q0", "q1", "q2", "q3", "q4", "q5", "q6", "q7", "q8", "q9"]);
    let chunks = scorer.chunks.lock().unwrap().clone();
    assert_eq!(chunks.len(), 5);
    assert!(chunks.iter().all(|c| c.len() == 2));
    assert_eq!(chunks[1], vec!["q2", "q3"]);
    assert_eq!(limiter.waits.load(Ordering::SeqCst), 5);

    assert_eq!(scored[7].scores["context_recall"], 0.7);
    assert_eq!(scored[0].answer.as_deref(), Some("There is no answer."));
    assert_eq!(scored[1].answer.as_deref(), Some("answer 1"));
}

#[tokio::test]
async fn test_indivisible_chunking_is_rejected_before_scoring() {
    let scorer = Arc::new(RecordingScorer::default());
    let evaluator = ChunkedEvaluator::new(scorer.clone(), Arc::new(NoDelay));

    let err = evaluator.evaluate_in_chunks(records(10), &metrics(), 3).await.unwrap_err();
    assert!(matches!(err, EvalError::InvalidChunking { rows: 10, chunks: 3 }));
    assert_eq!(err.status_code(), 400);

    let err = evaluator.evaluate_in_chunks(records(10), &metrics(), 0).await.unwrap_err();
    assert!(matches!(err, EvalError::InvalidChunking { .. }));
    assert!(scorer.chunks.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_metrics_are_dropped() {
    let scorer = Arc::new(RecordingScorer::default());
    let evaluator = ChunkedEvaluator::new(scorer, Arc::new(NoDelay));

    let names = vec!["bleu".to_string(), "faithfulness".to_string()];
    let scored = evaluator.evaluate_in_chunks(records(4), &names, 2).await.unwrap();
    assert_eq!(scored[0].scores.keys().collect::<Vec<_>>(), vec!["faithfulness"]);

    let err = evaluator.evaluate_in_chunks(records(4), &["bleu".to_string()], 2).await.unwrap_err();
    assert!(matches!(err, EvalError::InvalidInput(_)));
}

#[tokio::test]
async fn test_failing_chunk_aborts_the_run() {
    let scorer = Arc::new(RecordingScorer { fail_on_call: Some(2), ..Default::default() });
    let evaluator = ChunkedEvaluator::new(scorer.clone(), Arc::new(NoDelay));

    let err = evaluator.evaluate_in_chunks(records(6), &metrics(), 3).await.unwrap_err();
    assert!(matches!(err, EvalError::Metric { .. }));
    assert_eq!(scorer.chunks.lock().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_interval_limiter_paces_chunks() {
    let evaluator = ChunkedEvaluator::new(
        Arc::new(RecordingScorer::default()),
        Arc::new(IntervalLimiter::new(Duration::from_secs(10))),
    );
    let start = tokio::time::Instant::now();
    evaluator.evaluate_in_chunks(records(6), &metrics(), 3).await.unwrap();
    assert!(start.elapsed() >= Duration::from_secs(20));
}

#[test]
fn test_means_skip_unscored_rows() {
    let mut rows = records(3);
    rows[0].scores.insert("faithfulness".into(), 1.0);
    rows[1].scores.insert("faithfulness".into(), 0.5);
    let means = metric_means(&rows, &["faithfulness".to_string(), "context_recall".to_string()]);
    assert_eq!(means.len(), 1);
    assert_eq!(means["faithfulness"], 0.75);
}
