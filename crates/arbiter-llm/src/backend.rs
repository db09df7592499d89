use std::sync::Arc;
use std::time::Duration;

use arbiter_config::{BackendsConfig, LOCAL_BACKEND, REMOTE_BACKEND};
use async_trait::async_trait;

use crate::error::BackendError;
use crate::openai::OpenAiBackend;

/// What a backend is asked
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionRequest {
    pub question: String,
    /// Recent conversation lines, oldest first
    pub context: Vec<String>,
}

impl CompletionRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            context: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_context(mut self, context: Vec<String>) -> Self {
        self.context = context;
        self
    }
}

/// Outcome of one backend call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawResult {
    /// Non-blank text, unvalidated
    Text(String),
    /// Missing or whitespace-only content
    Empty,
    Error(BackendError),
}

impl RawResult {
    /// Classify message content, treating blank text as empty
    pub fn from_content(content: Option<String>) -> Self {
        match content {
            Some(text) if !text.trim().is_empty() => Self::Text(text),
            _ => Self::Empty,
        }
    }
}

/// A named model endpoint
#[async_trait]
pub trait Backend: Send + Sync {
    /// Stable name used for tracking and logs
    fn name(&self) -> &str;

    /// Configured upper bound on one call
    fn timeout(&self) -> Duration;

    /// Ask once; must resolve within `timeout`
    async fn invoke(&self, request: &CompletionRequest, timeout: Duration) -> RawResult;
}

/// The primary and secondary backends available to the orchestrator
#[derive(Clone, Default)]
pub struct BackendSet {
    pub local: Option<Arc<dyn Backend>>,
    pub remote: Option<Arc<dyn Backend>>,
}

impl BackendSet {
    /// Build HTTP clients for every configured backend
    pub fn from_config(config: &BackendsConfig) -> Self {
        let build = |name: &str| {
            config
                .get(name)
                .map(|c| Arc::new(OpenAiBackend::new(name, c)) as Arc<dyn Backend>)
        };

        Self {
            local: build(LOCAL_BACKEND),
            remote: build(REMOTE_BACKEND),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Backend>> {
        match name {
            LOCAL_BACKEND => self.local.as_ref(),
            REMOTE_BACKEND => self.remote.as_ref(),
            _ => None,
        }
    }

    /// Wrap every backend, e.g. with a tracking decorator
    #[must_use]
    pub fn map(self, mut wrap: impl FnMut(Arc<dyn Backend>) -> Arc<dyn Backend>) -> Self {
        Self {
            local: self.local.map(&mut wrap),
            remote: self.remote.map(&mut wrap),
        }
    }
}

impl std::fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSet")
            .field("local", &self.local.as_ref().map(|b| b.name().to_owned()))
            .field("remote", &self.remote.as_ref().map(|b| b.name().to_owned()))
            .finish()
    }
}
