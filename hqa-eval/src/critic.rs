//! Second-pass answer validation.
//!
//! A critic model reads each question, its retrieved contexts and the
//! generated answer, and returns either the same answer, a corrected one
//! grounded in the contexts, or the no-answer sentence. The reply replaces
//! `answer`; the ground truth is never shown to the critic.

use std::sync::Arc;

use hqa_model::{ChatMessage, ChatModel};
use tracing::{debug, info, warn};

use crate::record::EvalRecord;

const CRITIC_INSTRUCTIONS: &str = "Fix the answer to the given question only if it is needed, \
using the given contexts. Follow these rules:
1. If the answer is already correct, return it unchanged. Most answers need no change.
2. If you change the answer, base the new answer only on the given contexts.
3. Keep the answer short and direct.
4. If the contexts hold no valid answer to the question, return 'There is no answer'.";

const FEW_SHOTS: [&str; 3] = [
    "\nWhen the given answer is valid:
question: Which city is the capital of France?
contexts: ['document: Paris is the capital and largest city of France.']
answer: Paris is the capital of France.
expected output: Paris is the capital of France.",
    "When there is no answer to the question in the contexts:
question: How many people live in Lyon?
contexts: ['document: Lyon sits where the Rhone and the Saone meet.']
answer: About half a million people live in Lyon.
expected output: There is no answer.",
    "When the answer needs to be changed:
question: Why did the club sign young players in 2024?
contexts: ['document: The club made 12 draft picks in 2024 because its roster was thin.']
answer: The club signed young players because it wanted to win the title.
expected output: The club signed young players because its roster was thin, making 12 draft picks.",
];

/// Outcome of one critic pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CriticReport {
    /// The input rows, answers replaced where the critic replied.
    pub records: Vec<EvalRecord>,
    /// Rows whose answer the critic changed.
    pub revised: usize,
    /// Rows the critic could not be asked about; their answer is unchanged.
    pub failed: usize,
}

/// The message list sent to the critic for one row.
pub fn critic_messages(record: &EvalRecord) -> Vec<ChatMessage> {
    let contexts = serde_json::to_string(&record.contexts).unwrap_or_default();
    let row = format!(
        "question: {}\ncontexts: {contexts}\nanswer: {}",
        record.question,
        record.answer.as_deref().unwrap_or_default()
    );
    vec![
        ChatMessage::system(CRITIC_INSTRUCTIONS),
        ChatMessage::assistant(format!("Here are few examples:{}", FEW_SHOTS[0])),
        ChatMessage::assistant(FEW_SHOTS[1]),
        ChatMessage::assistant(FEW_SHOTS[2]),
        ChatMessage::user(format!("generate an answer based on the instructions you got please : {row}")),
    ]
}

/// Ask `critic` to validate every answer, one row at a time.
///
/// A failed call or an empty reply leaves the row's answer unchanged and is
/// counted in [`CriticReport::failed`].
pub async fn validate_answers(records: Vec<EvalRecord>, critic: Arc<dyn ChatModel>) -> CriticReport {
    let total = records.len();
    let mut revised = 0;
    let mut failed = 0;
    let mut checked = Vec::with_capacity(total);

    for (i, mut record) in records.into_iter().enumerate() {
        match critic.generate_response(&critic_messages(&record)).await {
            Ok(reply) if !reply.trim().is_empty() => {
                let reply = reply.trim().to_string();
                if record.answer.as_deref().map(str::trim) != Some(reply.as_str()) {
                    revised += 1;
                    debug!(row = i + 1, "critic revised answer");
                }
                record.answer = Some(reply);
            }
            Ok(_) => {
                failed += 1;
                warn!(row = i + 1, total, critic = critic.name(), "critic returned an empty reply; answer kept");
            }
            Err(e) => {
                failed += 1;
                warn!(row = i + 1, total, critic = critic.name(), error = %e, "critic call failed; answer kept");
            }
        }
        checked.push(record);
    }

    info!(total, revised, failed, critic = critic.name(), "critic pass finished");
    CriticReport { records: checked, revised, failed }
}
