//! OpenAI-compatible chat completion backend
//!
//! Works against the hosted API and local servers that mirror its
//! `/chat/completions` route, such as Ollama or llama.cpp.

use std::time::{Duration, Instant};

use arbiter_config::BackendConfig;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::backend::{Backend, CompletionRequest, RawResult};
use crate::error::BackendError;
use crate::prompt::{DEFAULT_SYSTEM_PROMPT, system_prompt};
use crate::protocol::{ChatMessage, ChatRequest, ChatResponse};

/// Error bodies longer than this are cut before logging
const MAX_ERROR_BODY: usize = 256;

pub struct OpenAiBackend {
    name: String,
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    model: String,
    max_tokens: u32,
    temperature: f64,
    system_prompt: String,
    timeout: Duration,
}

impl OpenAiBackend {
    pub fn new(name: impl Into<String>, config: &BackendConfig) -> Self {
        Self {
            name: name.into(),
            client: Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_owned()),
            timeout: config.timeout,
        }
    }

    fn completions_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    async fn complete(&self, request: &CompletionRequest, timeout: Duration) -> Result<Option<String>, BackendError> {
        let system = system_prompt(&self.system_prompt, &request.context);
        let wire_request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.question,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        };

        let mut builder = self.client.post(self.completions_url()).json(&wire_request);

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(&e, timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BackendError::from_reqwest(&e, timeout))?;

        if !status.is_success() {
            return Err(BackendError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let wire_response: ChatResponse =
            serde_json::from_str(&body).map_err(|e| BackendError::Protocol(e.to_string()))?;

        Ok(wire_response.into_content())
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn invoke(&self, request: &CompletionRequest, timeout: Duration) -> RawResult {
        let start = Instant::now();

        let result = match tokio::time::timeout(timeout, self.complete(request, timeout)).await {
            Ok(Ok(content)) => RawResult::from_content(content),
            Ok(Err(e)) => RawResult::Error(e),
            Err(_) => RawResult::Error(BackendError::Timeout(timeout)),
        };

        match &result {
            RawResult::Text(text) => tracing::debug!(
                backend = %self.name,
                model = %self.model,
                chars = text.len(),
                elapsed_ms = start.elapsed().as_millis(),
                "backend answered"
            ),
            RawResult::Empty => tracing::debug!(backend = %self.name, model = %self.model, "backend returned no content"),
            RawResult::Error(e) => tracing::warn!(
                backend = %self.name,
                model = %self.model,
                kind = e.kind(),
                error = %e,
                "backend call failed"
            ),
        }

        result
    }
}
