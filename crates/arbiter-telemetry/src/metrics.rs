//! Metric names and the per-backend instrument set

use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram};

pub const BACKEND_ATTEMPT_COUNT: &str = "arbiter.backend.attempt.count";
pub const BACKEND_LATENCY: &str = "arbiter.backend.latency";
pub const REQUEST_OUTCOME_COUNT: &str = "arbiter.request.outcome.count";
pub const BACKEND_ESCALATION_COUNT: &str = "arbiter.backend.escalation.count";

/// Instruments mirrored from the in-process performance tracker
///
/// Backed by the global meter provider, so every call is a no-op until
/// [`crate::init`] installs an exporter.
#[derive(Clone)]
pub struct BackendMetrics {
    attempts: Counter<u64>,
    latency: Histogram<f64>,
    outcomes: Counter<u64>,
    escalations: Counter<u64>,
}

impl BackendMetrics {
    pub fn new() -> Self {
        let meter = global::meter("arbiter");

        Self {
            attempts: meter
                .u64_counter(BACKEND_ATTEMPT_COUNT)
                .with_description("Backend invocations by outcome")
                .build(),
            latency: meter
                .f64_histogram(BACKEND_LATENCY)
                .with_description("Wall-clock time of one backend invocation")
                .with_unit("s")
                .build(),
            outcomes: meter
                .u64_counter(REQUEST_OUTCOME_COUNT)
                .with_description("Requests by final outcome")
                .build(),
            escalations: meter
                .u64_counter(BACKEND_ESCALATION_COUNT)
                .with_description("Escalations away from a backend")
                .build(),
        }
    }

    /// Count one attempt against `backend`, labelled `succeeded` or `failed`
    pub fn record_attempt(&self, backend: &str, succeeded: bool) {
        let result = if succeeded { "succeeded" } else { "failed" };

        self.attempts.add(
            1,
            &[
                KeyValue::new("backend", backend.to_owned()),
                KeyValue::new("result", result),
            ],
        );
    }

    pub fn record_latency(&self, backend: &str, elapsed: Duration) {
        self.latency
            .record(elapsed.as_secs_f64(), &[KeyValue::new("backend", backend.to_owned())]);
    }

    /// Count a finished request by backend and outcome label
    pub fn record_outcome(&self, backend: &str, outcome: &'static str) {
        self.outcomes.add(
            1,
            &[
                KeyValue::new("backend", backend.to_owned()),
                KeyValue::new("outcome", outcome),
            ],
        );
    }

    pub fn record_escalation(&self, from: &str) {
        self.escalations
            .add(1, &[KeyValue::new("backend", from.to_owned())]);
    }
}

impl Default for BackendMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for BackendMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendMetrics").finish_non_exhaustive()
    }
}
