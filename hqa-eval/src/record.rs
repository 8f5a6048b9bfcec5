//! Labeled question rows and their CSV form.
//!
//! The CSV layout is `question, answer, contexts, ground_truth` followed by one
//! column per scored metric. `contexts` holds a JSON array of strings; a plain
//! string is read as a single context. Empty `answer` cells are missing answers.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

const FIXED_COLUMNS: [&str; 4] = ["question", "answer", "contexts", "ground_truth"];

/// One labeled question, optionally answered and scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub question: String,
    pub answer: Option<String>,
    pub contexts: Vec<String>,
    pub ground_truth: String,
    /// Metric name to score, filled in by evaluation.
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
}

impl EvalRecord {
    pub fn new(question: impl Into<String>, ground_truth: impl Into<String>) -> Self {
        Self { question: question.into(), ground_truth: ground_truth.into(), ..Self::default() }
    }
}

fn csv_err(path: &Path) -> impl FnOnce(csv::Error) -> EvalError + '_ {
    move |source| EvalError::Csv { path: path.to_path_buf(), source }
}

fn parse_contexts(cell: &str) -> Vec<String> {
    if cell.trim().is_empty() {
        return Vec::new();
    }
    serde_json::from_str(cell).unwrap_or_else(|_| vec![cell.to_string()])
}

/// Read records from a CSV file. `question` and `ground_truth` columns are
/// required; numeric cells in any other column become scores.
pub fn load_records(path: &Path) -> Result<Vec<EvalRecord>> {
    let mut reader = csv::Reader::from_path(path).map_err(csv_err(path))?;
    let headers: Vec<String> = reader.headers().map_err(csv_err(path))?.iter().map(String::from).collect();
    let column = |name: &str| headers.iter().position(|h| h == name);
    let (Some(question_idx), Some(truth_idx)) = (column("question"), column("ground_truth")) else {
        return Err(EvalError::InvalidInput(format!(
            "'{}' must have 'question' and 'ground_truth' columns",
            path.display()
        )));
    };
    let answer_idx = column("answer");
    let contexts_idx = column("contexts");

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row.map_err(csv_err(path))?;
        let cell = |idx: Option<usize>| idx.and_then(|i| row.get(i)).unwrap_or_default();
        let answer = cell(answer_idx);
        let scores = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !FIXED_COLUMNS.contains(&h.as_str()))
            .filter_map(|(i, h)| row.get(i)?.trim().parse::<f64>().ok().map(|v| (h.clone(), v)))
            .collect();
        records.push(EvalRecord {
            question: cell(Some(question_idx)).to_string(),
            answer: (!answer.trim().is_empty()).then(|| answer.to_string()),
            contexts: parse_contexts(cell(contexts_idx)),
            ground_truth: cell(Some(truth_idx)).to_string(),
            scores,
        });
    }
    Ok(records)
}

/// Write records to CSV; metric columns are the union of all score names.
pub fn save_records(path: &Path, records: &[EvalRecord]) -> Result<()> {
    let mut metrics: Vec<&String> = records.iter().flat_map(|r| r.scores.keys()).collect();
    metrics.sort();
    metrics.dedup();

    let mut writer = csv::Writer::from_path(path).map_err(csv_err(path))?;
    let header = FIXED_COLUMNS.iter().copied().chain(metrics.iter().map(|m| m.as_str()));
    writer.write_record(header).map_err(csv_err(path))?;

    for record in records {
        let contexts = serde_json::to_string(&record.contexts)
            .map_err(|e| EvalError::InvalidInput(format!("contexts not serializable: {e}")))?;
        let mut row = vec![
            record.question.clone(),
            record.answer.clone().unwrap_or_default(),
            contexts,
            record.ground_truth.clone(),
        ];
        row.extend(
            metrics.iter().map(|m| record.scores.get(*m).map(|v| v.to_string()).unwrap_or_default()),
        );
        writer.write_record(&row).map_err(csv_err(path))?;
    }
    writer.flush().map_err(|source| EvalError::Io { path: path.to_path_buf(), source })
}
