//! Logging and OpenTelemetry setup for Arbiter
//!
//! Always installs a `tracing` fmt subscriber. When an OTLP exporter is
//! configured, spans and metrics are exported as well.

mod metadata;
pub mod metrics;

use arbiter_config::{ExportProtocol, ExporterConfig, TelemetryConfig};
use opentelemetry::global;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::{MetricExporter, SpanExporter, WithExportConfig as _};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{Sampler, SdkTracerProvider};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// Flushes and shuts down exporters when dropped
#[must_use = "dropping the guard shuts telemetry down"]
pub struct TelemetryGuard {
    meter_provider: Option<SdkMeterProvider>,
    tracer_provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Push pending metrics to the collector now
    ///
    /// # Errors
    ///
    /// Returns an error if the meter provider fails to flush
    pub fn force_flush(&self) -> anyhow::Result<()> {
        if let Some(ref provider) = self.meter_provider {
            provider
                .force_flush()
                .map_err(|e| anyhow::anyhow!("failed to flush metrics: {e}"))?;
        }
        Ok(())
    }

    /// Whether spans and metrics leave the process
    pub const fn is_exporting(&self) -> bool {
        self.meter_provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("failed to shut down tracer provider: {e}");
        }
        if let Some(provider) = self.meter_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("failed to shut down meter provider: {e}");
        }
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` wins over `log_filter` when set.
///
/// # Errors
///
/// Returns an error if an OTLP exporter cannot be built
pub fn init(config: Option<&TelemetryConfig>, log_filter: &str) -> anyhow::Result<TelemetryGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout carries answers
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    let mut guard = TelemetryGuard {
        meter_provider: None,
        tracer_provider: None,
    };

    let otel_layer = match config.and_then(|c| c.exporter.as_ref().map(|e| (c, e))) {
        Some((config, exporter)) => {
            let resource = metadata::build_resource(config);

            let meter_provider = meter_provider(exporter, resource.clone())?;
            global::set_meter_provider(meter_provider.clone());

            let tracer_provider = tracer_provider(exporter, sampler(config.sampling_rate), resource)?;
            global::set_tracer_provider(tracer_provider.clone());
            let layer = tracing_opentelemetry::layer().with_tracer(tracer_provider.tracer("arbiter"));

            guard.meter_provider = Some(meter_provider);
            guard.tracer_provider = Some(tracer_provider);
            Some(layer)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    if let Some(exporter) = config.and_then(|c| c.exporter.as_ref()) {
        tracing::debug!(endpoint = %exporter.endpoint, protocol = ?exporter.protocol, "OTLP export enabled");
    }

    Ok(guard)
}

/// Head sampler for request spans; child spans follow their parent
fn sampler(sampling_rate: f64) -> Sampler {
    let root = if sampling_rate >= 1.0 {
        Sampler::AlwaysOn
    } else if sampling_rate <= 0.0 {
        Sampler::AlwaysOff
    } else {
        Sampler::TraceIdRatioBased(sampling_rate)
    };
    Sampler::ParentBased(Box::new(root))
}

fn export_error(signal: &str, exporter: &ExporterConfig, e: impl std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!(
        "failed to build {signal} exporter for {} ({:?}): {e}",
        exporter.endpoint,
        exporter.protocol
    )
}

fn meter_provider(exporter: &ExporterConfig, resource: Resource) -> anyhow::Result<SdkMeterProvider> {
    let builder = MetricExporter::builder();
    let metric_exporter = match exporter.protocol {
        ExportProtocol::Grpc => builder.with_tonic().with_endpoint(exporter.endpoint.as_str()).build(),
        ExportProtocol::HttpProto => builder.with_http().with_endpoint(exporter.endpoint.as_str()).build(),
    }
    .map_err(|e| export_error("metrics", exporter, e))?;

    Ok(SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(
            PeriodicReader::builder(metric_exporter)
                .with_interval(exporter.interval)
                .build(),
        )
        .build())
}

fn tracer_provider(exporter: &ExporterConfig, sampler: Sampler, resource: Resource) -> anyhow::Result<SdkTracerProvider> {
    let builder = SpanExporter::builder();
    let span_exporter = match exporter.protocol {
        ExportProtocol::Grpc => builder.with_tonic().with_endpoint(exporter.endpoint.as_str()).build(),
        ExportProtocol::HttpProto => builder.with_http().with_endpoint(exporter.endpoint.as_str()).build(),
    }
    .map_err(|e| export_error("span", exporter, e))?;

    Ok(SdkTracerProvider::builder()
        .with_resource(resource)
        .with_sampler(sampler)
        .with_batch_exporter(span_exporter)
        .build())
}
