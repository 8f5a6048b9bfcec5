//! Answering and scoring a labeled question set.
//!
//! Scoring runs in `chunks_amount` contiguous, equal-sized chunks, one after
//! the other, with the [`RateLimiter`] deciding how long to wait before each.
//! Chunk results are stitched back together in order. The first failing chunk
//! aborts the run.

use std::collections::BTreeMap;
use std::sync::Arc;

use hqa_rag::{LlmOverrides, QaChain};
use tracing::{info, warn};

use crate::error::{EvalError, Result};
use crate::metric::{Metric, MetricScorer};
use crate::pacing::RateLimiter;
use crate::record::EvalRecord;

pub const DEFAULT_NO_ANSWER: &str = "There is no answer.";

/// Drives a [`MetricScorer`] over a record set in paced chunks.
pub struct ChunkedEvaluator {
    scorer: Arc<dyn MetricScorer>,
    limiter: Arc<dyn RateLimiter>,
    no_answer: String,
}

impl ChunkedEvaluator {
    pub fn new(scorer: Arc<dyn MetricScorer>, limiter: Arc<dyn RateLimiter>) -> Self {
        Self { scorer, limiter, no_answer: DEFAULT_NO_ANSWER.to_string() }
    }

    /// Text substituted for missing answers before scoring.
    pub fn with_no_answer(mut self, text: impl Into<String>) -> Self {
        self.no_answer = text.into();
        self
    }

    /// Score `records` with the named metrics, `records.len() / chunks_amount`
    /// rows at a time.
    ///
    /// Unknown metric names are dropped with a warning.
    ///
    /// # Errors
    ///
    /// - [`EvalError::InvalidChunking`] if `chunks_amount` is zero or does not
    ///   divide the row count; checked before any scoring
    /// - [`EvalError::InvalidInput`] if no known metric remains
    /// - whatever the scorer returns for the first failing chunk
    pub async fn evaluate_in_chunks(
        &self,
        records: Vec<EvalRecord>,
        metric_names: &[String],
        chunks_amount: usize,
    ) -> Result<Vec<EvalRecord>> {
        let rows = records.len();
        if chunks_amount == 0 || rows % chunks_amount != 0 {
            return Err(EvalError::InvalidChunking { rows, chunks: chunks_amount });
        }

        let metrics: Vec<Metric> = metric_names
            .iter()
            .filter_map(|name| match name.parse::<Metric>() {
                Ok(metric) => Some(metric),
                Err(_) => {
                    warn!(metric = %name, "ignoring unknown metric");
                    None
                }
            })
            .collect();
        if metrics.is_empty() {
            return Err(EvalError::InvalidInput(format!("no known metric in {metric_names:?}")));
        }

        let mut records: Vec<EvalRecord> = records
            .into_iter()
            .map(|mut r| {
                if r.answer.as_deref().is_none_or(|a| a.trim().is_empty()) {
                    r.answer = Some(self.no_answer.clone());
                }
                r
            })
            .collect();

        let chunk_len = rows / chunks_amount;
        if chunk_len == 0 {
            return Ok(records);
        }
        for (index, chunk) in records.chunks_mut(chunk_len).enumerate() {
            self.limiter.wait().await;
            let scores = self.scorer.score(chunk, &metrics).await?;
            if scores.len() != chunk.len() {
                return Err(EvalError::Metric {
                    metric: "*".to_string(),
                    message: format!("scorer returned {} rows for a chunk of {}", scores.len(), chunk.len()),
                });
            }
            for (record, row_scores) in chunk.iter_mut().zip(scores) {
                record.scores.extend(row_scores);
            }
            info!(chunk = index + 1, of = chunks_amount, rows = chunk.len(), "chunk scored");
        }
        Ok(records)
    }
}

/// Answer every question with `chain`, sequentially, keeping the ground truth.
///
/// A provider failure (store, embedder, reranker or chat model) on one row is
/// logged and leaves that row's `answer` empty; the remaining rows are still
/// answered.
///
/// # Errors
///
/// Any other failure (unknown collection, unsupported provider, invalid
/// question) aborts the run, since it would fail every row the same way.
pub async fn answer_testset(
    chain: &QaChain,
    collection: &str,
    questions: Vec<EvalRecord>,
) -> Result<Vec<EvalRecord>> {
    let total = questions.len();
    let mut answered = Vec::with_capacity(total);
    let mut failed = 0;
    for (i, mut record) in questions.into_iter().enumerate() {
        match chain.qa_chain(collection, &record.question, &LlmOverrides::default()).await {
            Ok(result) => {
                record.contexts = result.contexts();
                record.answer = Some(result.answer);
                info!(collection, answered = i + 1, total, "question answered");
            }
            Err(e) if e.is_provider_error() => {
                failed += 1;
                record.answer = None;
                warn!(collection, row = i + 1, total, error = %e, "question left unanswered");
            }
            Err(e) => return Err(e.into()),
        }
        answered.push(record);
    }
    if failed > 0 {
        warn!(collection, failed, total, "some questions could not be answered");
    }
    Ok(answered)
}

/// Rows of `records` that carry no answer.
pub fn unanswered(records: &[EvalRecord]) -> usize {
    records.iter().filter(|r| r.answer.as_deref().is_none_or(|a| a.trim().is_empty())).count()
}

/// Mean of each metric over the records that carry it.
pub fn metric_means(records: &[EvalRecord], metrics: &[String]) -> BTreeMap<String, f64> {
    metrics
        .iter()
        .filter_map(|metric| {
            let values: Vec<f64> = records.iter().filter_map(|r| r.scores.get(metric).copied()).collect();
            (!values.is_empty()).then(|| (metric.clone(), values.iter().sum::<f64>() / values.len() as f64))
        })
        .collect()
}
