//! Per-backend performance bookkeeping
//!
//! Counts outcomes and keeps a bounded window of recent latencies per
//! backend. In-memory only; every record is mirrored to OpenTelemetry.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use arbiter_llm::{Backend, CompletionRequest, RawResult};
use arbiter_telemetry::metrics::BackendMetrics;
use async_trait::async_trait;
use dashmap::DashMap;

/// Latency samples kept when no window is configured
pub const DEFAULT_LATENCY_WINDOW: usize = 100;

struct BackendStats {
    succeeded: AtomicU64,
    failed: AtomicU64,
    escalations: AtomicU64,
    latencies: VecDeque<Duration>,
}

impl BackendStats {
    fn new(window: usize) -> Self {
        Self {
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            escalations: AtomicU64::new(0),
            latencies: VecDeque::with_capacity(window),
        }
    }
}

/// Track outcomes and latencies across all backends
pub struct PerformanceTracker {
    backends: DashMap<String, BackendStats>,
    window: usize,
    metrics: BackendMetrics,
}

impl PerformanceTracker {
    /// Tracker keeping up to `window` latency samples per backend, at least one
    pub fn new(window: usize) -> Self {
        Self {
            backends: DashMap::new(),
            window: window.max(1),
            metrics: BackendMetrics::new(),
        }
    }

    /// Push a latency sample, evicting the oldest once the window is full
    pub fn record_latency(&self, backend: &str, elapsed: Duration) {
        {
            let mut stats = self.stats_mut(backend);

            if stats.latencies.len() >= self.window {
                stats.latencies.pop_front();
            }
            stats.latencies.push_back(elapsed);
        }

        self.metrics.record_latency(backend, elapsed);
    }

    /// Count an attempt whose answer was accepted
    pub fn record_success(&self, backend: &str) {
        self.stats_mut(backend).succeeded.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_attempt(backend, true);
    }

    /// Count an attempt that was empty, failed in transport, or was rejected
    pub fn record_failure(&self, backend: &str) {
        self.stats_mut(backend).failed.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_attempt(backend, false);
    }

    /// Count a request that moved away from `backend`
    pub fn record_escalation(&self, backend: &str) {
        self.stats_mut(backend).escalations.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_escalation(backend);
    }

    /// Count a finished request by its final outcome label
    pub fn record_outcome(&self, backend: &str, outcome: &'static str) {
        self.metrics.record_outcome(backend, outcome);
    }

    /// Snapshot of one backend, `None` before its first record
    pub fn snapshot(&self, backend: &str) -> Option<BackendSnapshot> {
        let stats = self.backends.get(backend)?;

        let succeeded = stats.succeeded.load(Ordering::Relaxed);
        let failed = stats.failed.load(Ordering::Relaxed);
        let escalations = stats.escalations.load(Ordering::Relaxed);
        let samples: Vec<Duration> = stats.latencies.iter().copied().collect();
        drop(stats);

        Some(BackendSnapshot::new(backend.to_owned(), succeeded, failed, escalations, samples))
    }

    /// Snapshots of every backend seen so far, ordered by name
    pub fn snapshots(&self) -> Vec<BackendSnapshot> {
        let mut names: Vec<String> = self.backends.iter().map(|entry| entry.key().clone()).collect();
        names.sort();

        names.iter().filter_map(|name| self.snapshot(name)).collect()
    }

    fn stats_mut(&self, backend: &str) -> dashmap::mapref::one::RefMut<'_, String, BackendStats> {
        self.backends
            .entry(backend.to_owned())
            .or_insert_with(|| BackendStats::new(self.window))
    }
}

impl Default for PerformanceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_LATENCY_WINDOW)
    }
}

impl std::fmt::Debug for PerformanceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceTracker")
            .field("backends", &self.backends.len())
            .field("window", &self.window)
            .finish_non_exhaustive()
    }
}

/// Observed performance of one backend
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSnapshot {
    pub backend: String,
    /// Attempts that ended in an accepted answer or a failure
    pub requests: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub escalations: u64,
    /// `succeeded / requests`, `None` before the first request
    pub success_ratio: Option<f64>,
    /// `None` until a latency sample exists
    pub latency: Option<LatencySummary>,
}

/// Latency statistics over the retained window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySummary {
    pub samples: usize,
    pub average: Duration,
    pub min: Duration,
    pub max: Duration,
    pub p50: Duration,
    pub p95: Duration,
}

impl BackendSnapshot {
    #[allow(clippy::cast_precision_loss)]
    fn new(backend: String, succeeded: u64, failed: u64, escalations: u64, mut samples: Vec<Duration>) -> Self {
        let requests = succeeded + failed;
        let success_ratio = (requests > 0).then(|| succeeded as f64 / requests as f64);

        samples.sort_unstable();
        let latency = LatencySummary::from_sorted(&samples);

        Self {
            backend,
            requests,
            succeeded,
            failed,
            escalations,
            success_ratio,
            latency,
        }
    }
}

impl LatencySummary {
    fn from_sorted(sorted: &[Duration]) -> Option<Self> {
        let (&min, &max) = (sorted.first()?, sorted.last()?);
        let total: Duration = sorted.iter().sum();
        let count = u32::try_from(sorted.len()).unwrap_or(u32::MAX);

        Some(Self {
            samples: sorted.len(),
            average: total / count,
            min,
            max,
            p50: percentile(sorted, 0.50),
            p95: percentile(sorted, 0.95),
        })
    }
}

/// Nearest-rank percentile from sorted values
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = (p * (sorted.len() - 1) as f64).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Backend decorator that reports the wall-clock time of every call
pub struct TrackedBackend {
    inner: Arc<dyn Backend>,
    tracker: Arc<PerformanceTracker>,
}

impl TrackedBackend {
    /// Wrap `inner` so every invocation records its latency
    pub fn new(inner: Arc<dyn Backend>, tracker: Arc<PerformanceTracker>) -> Self {
        Self { inner, tracker }
    }

    /// Wrap `inner` as a trait object
    pub fn wrap(inner: Arc<dyn Backend>, tracker: &Arc<PerformanceTracker>) -> Arc<dyn Backend> {
        Arc::new(Self::new(inner, Arc::clone(tracker)))
    }
}

#[async_trait]
impl Backend for TrackedBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn timeout(&self) -> Duration {
        self.inner.timeout()
    }

    async fn invoke(&self, request: &CompletionRequest, timeout: Duration) -> RawResult {
        let start = Instant::now();
        let result = self.inner.invoke(request, timeout).await;
        self.tracker.record_latency(self.inner.name(), start.elapsed());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_and_ratio() {
        let tracker = PerformanceTracker::default();

        tracker.record_success("local");
        tracker.record_failure("local");
        tracker.record_failure("local");
        tracker.record_success("local");

        let snapshot = tracker.snapshot("local").unwrap();
        assert_eq!(snapshot.requests, 4);
        assert_eq!(snapshot.succeeded, 2);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.success_ratio, Some(0.5));
        assert!(snapshot.latency.is_none());
    }

    #[test]
    fn unknown_backend_has_no_snapshot() {
        assert!(PerformanceTracker::default().snapshot("remote").is_none());
    }

    #[test]
    fn latency_window_evicts_oldest() {
        let tracker = PerformanceTracker::new(3);

        for ms in [10, 20, 30] {
            tracker.record_latency("local", Duration::from_millis(ms));
        }
        let full = tracker.snapshot("local").unwrap().latency.unwrap();
        assert_eq!(full.samples, 3);
        assert_eq!(full.min, Duration::from_millis(10));

        tracker.record_latency("local", Duration::from_millis(40));
        let after = tracker.snapshot("local").unwrap().latency.unwrap();
        assert_eq!(after.samples, 3);
        assert_eq!(after.min, Duration::from_millis(20));
        assert_eq!(after.max, Duration::from_millis(40));
    }

    #[test]
    fn window_never_exceeds_capacity() {
        let tracker = PerformanceTracker::default();

        for ms in 0..=250 {
            tracker.record_latency("remote", Duration::from_millis(ms));
        }

        let latency = tracker.snapshot("remote").unwrap().latency.unwrap();
        assert_eq!(latency.samples, DEFAULT_LATENCY_WINDOW);
        assert_eq!(latency.min, Duration::from_millis(151));
    }

    #[test]
    fn summary_statistics() {
        let tracker = PerformanceTracker::default();

        for ms in 1..=100 {
            tracker.record_latency("local", Duration::from_millis(ms));
        }

        let latency = tracker.snapshot("local").unwrap().latency.unwrap();
        assert_eq!(latency.average, Duration::from_micros(50_500));
        assert_eq!(latency.min, Duration::from_millis(1));
        assert_eq!(latency.max, Duration::from_millis(100));
        assert_eq!(latency.p50, Duration::from_millis(51));
        assert_eq!(latency.p95, Duration::from_millis(95));
    }

    #[test]
    fn snapshots_are_sorted_by_name() {
        let tracker = PerformanceTracker::default();
        tracker.record_escalation("remote");
        tracker.record_success("local");

        let names: Vec<_> = tracker.snapshots().into_iter().map(|s| s.backend).collect();
        assert_eq!(names, vec!["local", "remote"]);
        assert_eq!(tracker.snapshot("remote").unwrap().escalations, 1);
        assert_eq!(tracker.snapshot("remote").unwrap().success_ratio, None);
    }

    #[test]
    fn concurrent_records_are_not_lost() {
        let tracker = Arc::new(PerformanceTracker::new(1000));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tracker.record_success("local");
                        tracker.record_latency("local", Duration::from_millis(1));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = tracker.snapshot("local").unwrap();
        assert_eq!(snapshot.succeeded, 800);
        assert_eq!(snapshot.latency.unwrap().samples, 800);
    }
}
