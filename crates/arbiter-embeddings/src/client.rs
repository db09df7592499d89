use std::time::Duration;

use arbiter_config::EmbeddingsConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::EmbeddingsError;

const MAX_ERROR_BODY: usize = 256;

/// Client for an OpenAI-compatible `/embeddings` route
pub struct EmbeddingsClient {
    client: Client,
    base_url: Url,
    api_key: Option<SecretString>,
    model: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [&'a str],
    model: &'a str,
    encoding_format: &'static str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl EmbeddingsClient {
    pub fn new(config: &EmbeddingsConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            timeout: config.timeout,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn embeddings_url(&self) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{base}/embeddings")
    }

    /// Embed every input, returning vectors in input order
    pub async fn embed(&self, inputs: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingsError> {
        let wire_request = EmbeddingRequest {
            input: inputs,
            model: &self.model,
            encoding_format: "float",
        };

        tracing::debug!(model = %self.model, inputs = inputs.len(), "sending embeddings request");

        let mut builder = self
            .client
            .post(self.embeddings_url())
            .timeout(self.timeout)
            .json(&wire_request);

        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(EmbeddingsError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let mut wire_response: EmbeddingResponse =
            serde_json::from_str(&body).map_err(|e| EmbeddingsError::Protocol(e.to_string()))?;

        if wire_response.data.len() != inputs.len() {
            return Err(EmbeddingsError::Protocol(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                wire_response.data.len()
            )));
        }

        wire_response.data.sort_by_key(|d| d.index);
        Ok(wire_response.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl std::fmt::Debug for EmbeddingsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingsClient")
            .field("base_url", &self.base_url.as_str())
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
