use indexmap::IndexMap;
use serde::Deserialize;
use url::Url;

/// Logging and OpenTelemetry export settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryConfig {
    /// Service name reported on exported resources
    #[serde(default = "default_service_name")]
    pub service_name: String,
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    /// Extra resource attributes, exported in declaration order
    #[serde(default)]
    pub resource_attributes: IndexMap<String, String>,
    /// OTLP exporter; traces and metrics stay local when absent
    #[serde(default)]
    pub exporter: Option<ExporterConfig>,
    /// Fraction of traces sampled, `0.0..=1.0`
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_filter: default_log_filter(),
            resource_attributes: IndexMap::new(),
            exporter: None,
            sampling_rate: default_sampling_rate(),
        }
    }
}

/// OTLP exporter endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    /// Collector endpoint
    pub endpoint: Url,
    /// Wire protocol
    #[serde(default)]
    pub protocol: ExportProtocol,
    /// Metric export interval
    #[serde(default = "default_export_interval", deserialize_with = "crate::duration::deserialize")]
    pub interval: std::time::Duration,
}

/// OTLP wire protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportProtocol {
    /// gRPC via tonic
    #[default]
    Grpc,
    /// HTTP with protobuf bodies
    HttpProto,
}

fn default_service_name() -> String {
    "arbiter".to_owned()
}

fn default_log_filter() -> String {
    "info".to_owned()
}

const fn default_sampling_rate() -> f64 {
    1.0
}

const fn default_export_interval() -> std::time::Duration {
    std::time::Duration::from_secs(10)
}
