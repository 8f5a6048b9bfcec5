//! Second-stage reranking of retrieved passages.
//!
//! Every [`Reranker`] consumes passages in their rendered string form (see
//! [`Passage::render`](crate::document::Passage::render)) and returns at most
//! `limit` of them, most relevant first. An empty candidate list yields an
//! empty result without any scoring call.

use std::cmp::Ordering;
use std::sync::Arc;

use async_trait::async_trait;
use hqa_model::FailureKind;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{RagError, Result};

/// A reranker that reorders candidates by relevance to the query.
#[async_trait]
pub trait Reranker: Send + Sync {
    fn name(&self) -> &str;

    /// Return at most `limit` candidates, most relevant first.
    async fn rerank(&self, query: &str, candidates: Vec<String>, limit: usize) -> Result<Vec<String>>;
}

/// A pairwise `(query, document)` relevance scorer.
#[async_trait]
pub trait CrossEncoder: Send + Sync {
    async fn score(&self, query: &str, document: &str) -> Result<f32>;

    /// Score every document against `query`, in input order.
    ///
    /// The default implementation calls [`score`](CrossEncoder::score)
    /// sequentially; batched backends should override it.
    async fn score_all(&self, query: &str, documents: &[String]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(documents.len());
        for document in documents {
            scores.push(self.score(query, document).await?);
        }
        Ok(scores)
    }
}

/// Reranks with a local [`CrossEncoder`]: stable descending sort by score,
/// so equal scores keep their retrieval order. `NaN` sorts last.
pub struct CrossEncoderReranker {
    encoder: Arc<dyn CrossEncoder>,
    name: String,
}

impl CrossEncoderReranker {
    pub fn new(encoder: Arc<dyn CrossEncoder>, name: impl Into<String>) -> Self {
        Self { encoder, name: name.into() }
    }
}

/// Order `candidates` by `scores` descending, ties in input order.
pub(crate) fn order_by_scores(candidates: Vec<String>, scores: &[f32], limit: usize) -> Vec<String> {
    let mut scored: Vec<(f32, String)> = candidates
        .into_iter()
        .zip(scores.iter().copied())
        .map(|(candidate, score)| (if score.is_nan() { f32::NEG_INFINITY } else { score }, candidate))
        .collect();
    // sort_by is stable
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    scored.into_iter().take(limit).map(|(_, candidate)| candidate).collect()
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    fn name(&self) -> &str {
        &self.name
    }

    async fn rerank(&self, query: &str, candidates: Vec<String>, limit: usize) -> Result<Vec<String>> {
        if candidates.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let scores = self.encoder.score_all(query, &candidates).await?;
        if scores.len() != candidates.len() {
            return Err(RagError::RerankerError {
                reranker: self.name.clone(),
                message: format!("got {} scores for {} candidates", scores.len(), candidates.len()),
                kind: FailureKind::Malformed,
            });
        }
        debug!(reranker = %self.name, candidates = candidates.len(), limit, "cross-encoder rerank");
        Ok(order_by_scores(candidates, &scores, limit))
    }
}

/// Keeps retrieval order and truncates to `limit`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughReranker;

#[async_trait]
impl Reranker for PassthroughReranker {
    fn name(&self) -> &str {
        "none"
    }

    async fn rerank(&self, _query: &str, mut candidates: Vec<String>, limit: usize) -> Result<Vec<String>> {
        candidates.truncate(limit);
        Ok(candidates)
    }
}

/// Cohere's hosted `/v2/rerank` endpoint. The API's ordering is kept as is.
pub struct CohereReranker {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl CohereReranker {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        client: reqwest::Client,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(RagError::ConfigError("Cohere API key must not be empty".into()));
        }
        Ok(Self { client, api_key, base_url: base_url.into(), model: model.into() })
    }

    fn fail(&self, kind: FailureKind, message: String) -> RagError {
        RagError::RerankerError { reranker: "cohere".to_string(), message, kind }
    }
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankHit>,
}

#[derive(Deserialize)]
struct RerankHit {
    index: usize,
    #[allow(dead_code)]
    relevance_score: f32,
}

#[derive(Deserialize)]
struct ErrorResponse {
    message: String,
}

/// Map the API's ranked indices back onto the candidates.
fn select_indices(
    candidates: &[String],
    hits: &[RerankHit],
    limit: usize,
) -> std::result::Result<Vec<String>, usize> {
    hits.iter()
        .take(limit)
        .map(|hit| candidates.get(hit.index).cloned().ok_or(hit.index))
        .collect()
}

#[async_trait]
impl Reranker for CohereReranker {
    fn name(&self) -> &str {
        &self.model
    }

    async fn rerank(&self, query: &str, candidates: Vec<String>, limit: usize) -> Result<Vec<String>> {
        if candidates.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let top_n = limit.min(candidates.len());
        debug!(reranker = "cohere", model = %self.model, candidates = candidates.len(), top_n, "rerank");

        let response = self
            .client
            .post(format!("{}/v2/rerank", self.base_url.trim_end_matches('/')))
            .bearer_auth(&self.api_key)
            .json(&RerankRequest { model: &self.model, query, documents: &candidates, top_n })
            .send()
            .await
            .map_err(|e| {
                error!(reranker = "cohere", error = %e, "request failed");
                self.fail(FailureKind::from_reqwest(&e), format!("request failed: {e}"))
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.fail(FailureKind::Malformed, format!("failed to read response: {e}")))?;
        if !status.is_success() {
            let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.message).unwrap_or(body);
            error!(reranker = "cohere", %status, "API error");
            return Err(self.fail(
                FailureKind::from_status(status.as_u16(), &detail),
                format!("API returned {status}: {detail}"),
            ));
        }

        let parsed: RerankResponse = serde_json::from_str(&body)
            .map_err(|e| self.fail(FailureKind::Malformed, format!("failed to parse response: {e}")))?;
        select_indices(&candidates, &parsed.results, top_n).map_err(|index| {
            self.fail(
                FailureKind::Malformed,
                format!("index {index} out of range for {} candidates", candidates.len()),
            )
        })
    }
}
