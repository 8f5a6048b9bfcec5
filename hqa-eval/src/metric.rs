//! Evaluation metrics and scorers.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use hqa_model::{ChatMessage, ChatModel};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EvalError, Result};
use crate::record::EvalRecord;

/// The metrics a scorer may be asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Faithfulness,
    AnswerCorrectness,
    AnswerRelevancy,
    ContextEntityRecall,
    ContextPrecision,
    ContextRecall,
    ContextRelevancy,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Self::Faithfulness,
        Self::AnswerCorrectness,
        Self::AnswerRelevancy,
        Self::ContextEntityRecall,
        Self::ContextPrecision,
        Self::ContextRecall,
        Self::ContextRelevancy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Faithfulness => "faithfulness",
            Self::AnswerCorrectness => "answer_correctness",
            Self::AnswerRelevancy => "answer_relevancy",
            Self::ContextEntityRecall => "context_entity_recall",
            Self::ContextPrecision => "context_precision",
            Self::ContextRecall => "context_recall",
            Self::ContextRelevancy => "context_relevancy",
        }
    }

    /// What the judge is asked to measure.
    fn rubric(&self) -> &'static str {
        match self {
            Self::Faithfulness => "the fraction of claims in the answer that are supported by the contexts",
            Self::AnswerCorrectness => "how factually and semantically close the answer is to the ground truth",
            Self::AnswerRelevancy => "how directly the answer addresses the question, penalising padding",
            Self::ContextEntityRecall => "the fraction of entities in the ground truth that appear in the contexts",
            Self::ContextPrecision => "whether the contexts useful for the ground truth are ranked first",
            Self::ContextRecall => "the fraction of ground-truth statements attributable to the contexts",
            Self::ContextRelevancy => "the fraction of context sentences relevant to the question",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| EvalError::InvalidInput(format!("unknown metric '{s}'")))
    }
}

/// Scores a chunk of answered records.
///
/// Returns one score map per record, in input order.
#[async_trait]
pub trait MetricScorer: Send + Sync {
    async fn score(&self, records: &[EvalRecord], metrics: &[Metric]) -> Result<Vec<BTreeMap<String, f64>>>;
}

const JUDGE_PROMPT: &str = "You are a strict evaluator of a question-answering system. \
Reply with a single number between 0 and 1 and nothing else.";

/// A [`MetricScorer`] that asks a chat model to grade each metric.
pub struct LlmJudgeScorer {
    judge: Arc<dyn ChatModel>,
}

impl LlmJudgeScorer {
    pub fn new(judge: Arc<dyn ChatModel>) -> Self {
        Self { judge }
    }

    fn messages(record: &EvalRecord, metric: Metric) -> Vec<ChatMessage> {
        let contexts = serde_json::to_string(&record.contexts).unwrap_or_default();
        vec![
            ChatMessage::system(JUDGE_PROMPT),
            ChatMessage::user(format!(
                "Metric: {metric} ({})\nQuestion: {}\nAnswer: {}\nContexts: {contexts}\nGround truth: {}",
                metric.rubric(),
                record.question,
                record.answer.as_deref().unwrap_or_default(),
                record.ground_truth,
            )),
        ]
    }
}

/// Pull the first number out of a judge reply and clamp it to `0..=1`.
pub fn parse_score(reply: &str) -> Option<f64> {
    reply
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .filter(|t| !t.is_empty())
        .find_map(|t| t.parse::<f64>().ok())
        .map(|v| v.clamp(0.0, 1.0))
}

#[async_trait]
impl MetricScorer for LlmJudgeScorer {
    async fn score(&self, records: &[EvalRecord], metrics: &[Metric]) -> Result<Vec<BTreeMap<String, f64>>> {
        let mut all = Vec::with_capacity(records.len());
        for record in records {
            let mut scores = BTreeMap::new();
            for metric in metrics {
                let reply = self.judge.generate_response(&Self::messages(record, *metric)).await?;
                let value = parse_score(&reply).ok_or_else(|| EvalError::Metric {
                    metric: metric.to_string(),
                    message: format!("judge reply has no score: {reply:?}"),
                })?;
                debug!(metric = %metric, score = value, "judged");
                scores.insert(metric.to_string(), value);
            }
            all.push(scores);
        }
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hqa_model::MockChatModel;

    #[test]
    fn names_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(metric.as_str().parse::<Metric>().unwrap(), metric);
        }
        assert!("bleu".parse::<Metric>().is_err());
    }

    #[test]
    fn scores_are_extracted_and_clamped() {
        assert_eq!(parse_score("0.8"), Some(0.8));
        assert_eq!(parse_score("Score: 1."), Some(1.0));
        assert_eq!(parse_score("7"), Some(1.0));
        assert_eq!(parse_score("no idea"), None);
    }

    #[tokio::test]
    async fn judge_scores_every_metric_per_record() {
        let judge = MockChatModel::new("0.5");
        judge.push_reply("0.9");
        let scorer = LlmJudgeScorer::new(Arc::new(judge.clone()));
        let mut record = EvalRecord::new("q", "t");
        record.answer = Some("a".into());

        let scores = scorer
            .score(&[record], &[Metric::AnswerCorrectness, Metric::ContextRecall])
            .await
            .unwrap();
        assert_eq!(scores[0]["answer_correctness"], 0.9);
        assert_eq!(scores[0]["context_recall"], 0.5);
        assert!(judge.calls()[0][1].content.contains("Ground truth: t"));
    }

    #[tokio::test]
    async fn unparseable_reply_is_a_metric_error() {
        let scorer = LlmJudgeScorer::new(Arc::new(MockChatModel::new("great answer")));
        let err = scorer.score(&[EvalRecord::new("q", "t")], &[Metric::Faithfulness]).await.unwrap_err();
        assert!(matches!(err, EvalError::Metric { .. }));
    }
}
