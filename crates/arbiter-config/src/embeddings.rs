use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// OpenAI-compatible embeddings endpoint used for semantic scoring
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddingsConfig {
    /// Base URL including the API version prefix
    pub base_url: Url,
    /// Bearer token
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Embedding model identifier
    pub model: String,
    /// Number of embeddings kept in the LRU cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
    /// Upper bound on one embeddings call
    #[serde(default = "default_timeout", deserialize_with = "crate::duration::deserialize")]
    pub timeout: Duration,
}

const fn default_cache_capacity() -> u64 {
    1000
}

const fn default_timeout() -> Duration {
    Duration::from_secs(10)
}
