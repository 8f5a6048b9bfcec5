//! Scripted chat backend for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{FailureKind, ModelError, Result};
use crate::message::ChatMessage;
use crate::provider::{ChatModel, ProviderFactory, ProviderKind};

/// A [`ChatModel`] that replays scripted replies and records every request.
///
/// When the script runs out it falls back to the default reply.
#[derive(Debug, Clone)]
pub struct MockChatModel {
    name: String,
    default_reply: String,
    script: Arc<Mutex<VecDeque<Result<String>>>>,
    calls: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl MockChatModel {
    pub fn new(default_reply: impl Into<String>) -> Self {
        Self {
            name: "mock".to_string(),
            default_reply: default_reply.into(),
            script: Arc::default(),
            calls: Arc::default(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Queue a reply for the next call.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.lock_script().push_back(Ok(reply.into()));
    }

    /// Queue a provider failure for the next call.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.lock_script().push_back(Err(ModelError::Provider {
            provider: "mock".into(),
            message: message.into(),
            kind: FailureKind::Rejected,
        }));
    }

    /// Every message list received so far, in call order.
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<String>>> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate_response(&self, messages: &[ChatMessage]) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }
        self.lock_script().pop_front().unwrap_or_else(|| Ok(self.default_reply.clone()))
    }
}

/// A [`ProviderFactory`] that hands out one shared [`MockChatModel`] and
/// records which `(provider, model)` pairs were requested.
#[derive(Debug, Clone)]
pub struct MockProviderFactory {
    model: MockChatModel,
    requests: Arc<Mutex<Vec<(ProviderKind, String)>>>,
}

impl MockProviderFactory {
    pub fn new(model: MockChatModel) -> Self {
        Self { model, requests: Arc::default() }
    }

    pub fn requests(&self) -> Vec<(ProviderKind, String)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ProviderFactory for MockProviderFactory {
    fn create(&self, kind: ProviderKind, model: &str) -> Result<Arc<dyn ChatModel>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((kind, model.to_string()));
        }
        Ok(Arc::new(self.model.clone().with_name(model)))
    }
}
