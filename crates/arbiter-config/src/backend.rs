use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

/// Name of the primary backend
pub const LOCAL_BACKEND: &str = "local";

/// Name of the secondary backend
pub const REMOTE_BACKEND: &str = "remote";

/// How a request is sequenced across backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
    /// Only the local backend is consulted
    LocalOnly,
    /// Only the remote backend is consulted
    #[serde(alias = "openai_only")]
    RemoteOnly,
    /// Local first, escalating to remote on exhaustion or low quality
    #[default]
    Fallback,
}

impl Mode {
    /// Backends this mode may invoke, in order
    pub const fn backends(self) -> &'static [&'static str] {
        match self {
            Self::LocalOnly => &[LOCAL_BACKEND],
            Self::RemoteOnly => &[REMOTE_BACKEND],
            Self::Fallback => &[LOCAL_BACKEND, REMOTE_BACKEND],
        }
    }
}

/// Configured model backends
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendsConfig {
    /// Primary backend, typically a local inference server
    #[serde(default)]
    pub local: Option<BackendConfig>,
    /// Secondary backend, typically a hosted API
    #[serde(default)]
    pub remote: Option<BackendConfig>,
}

impl BackendsConfig {
    /// Look up a backend by name
    pub fn get(&self, name: &str) -> Option<&BackendConfig> {
        match name {
            LOCAL_BACKEND => self.local.as_ref(),
            REMOTE_BACKEND => self.remote.as_ref(),
            _ => None,
        }
    }

    /// Configured backends with their names
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &BackendConfig)> {
        [(LOCAL_BACKEND, self.local.as_ref()), (REMOTE_BACKEND, self.remote.as_ref())]
            .into_iter()
            .filter_map(|(name, config)| config.map(|c| (name, c)))
    }
}

/// Configuration for one OpenAI-compatible backend
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendConfig {
    /// Base URL including the API version prefix, e.g. `http://localhost:11434/v1`
    pub base_url: Url,
    /// API key sent as a bearer token
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Model identifier
    pub model: String,
    /// Upper bound on a single call
    #[serde(default = "default_timeout", deserialize_with = "crate::duration::deserialize")]
    pub timeout: Duration,
    /// Maximum completion tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// System prompt override
    #[serde(default)]
    pub system_prompt: Option<String>,
}

const fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

const fn default_max_tokens() -> u32 {
    150
}

const fn default_temperature() -> f64 {
    0.7
}
