//! # hqa-eval
//!
//! Batch evaluation for the hybrid QA pipeline.
//!
//! [`answer_testset`] runs a [`QaChain`](hqa_rag::QaChain) over a labeled
//! question set; [`ChunkedEvaluator::evaluate_in_chunks`] then scores the
//! answers in equal chunks with a [`MetricScorer`], pacing the chunks with a
//! [`RateLimiter`] so an upstream judge is not overloaded. Between the two,
//! [`validate_answers`] can let a critic model correct answers against their
//! contexts.
//!
//! ```rust,ignore
//! let records = load_records(Path::new("testset.csv"))?;
//! let answered = answer_testset(&chain, "demo", records).await?;
//! let evaluator = ChunkedEvaluator::new(
//!     Arc::new(LlmJudgeScorer::new(judge)),
//!     Arc::new(IntervalLimiter::new(Duration::from_secs(10))),
//! );
//! let scored = evaluator.evaluate_in_chunks(answered, &metrics, 5).await?;
//! println!("{:?}", metric_means(&scored, &metrics));
//! ```

pub mod critic;
pub mod error;
pub mod metric;
pub mod pacing;
pub mod record;
pub mod runner;

pub use critic::{CriticReport, critic_messages, validate_answers};
pub use error::{EvalError, Result};
pub use metric::{LlmJudgeScorer, Metric, MetricScorer};
pub use pacing::{IntervalLimiter, NoDelay, RateLimiter};
pub use record::{EvalRecord, load_records, save_records};
pub use runner::{ChunkedEvaluator, DEFAULT_NO_ANSWER, answer_testset, metric_means, unanswered};
