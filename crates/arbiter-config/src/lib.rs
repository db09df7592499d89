#![allow(clippy::must_use_candidate)]

pub mod backend;
mod duration;
pub mod embeddings;
mod env;
mod loader;
pub mod policy;
pub mod telemetry;

use serde::Deserialize;

pub use backend::*;
pub use embeddings::*;
pub use policy::*;
pub use telemetry::{ExportProtocol, ExporterConfig, TelemetryConfig};

/// Top-level Arbiter configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Mode used when the caller does not pick one
    #[serde(default)]
    pub mode: Mode,
    /// Model backends
    #[serde(default)]
    pub backends: BackendsConfig,
    /// Retry, validation and scoring policy
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Embeddings endpoint for semantic similarity scoring
    #[serde(default)]
    pub embeddings: Option<EmbeddingsConfig>,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
