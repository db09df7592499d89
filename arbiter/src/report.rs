//! Plain-text rendering for the command line

use std::time::Duration;

use arbiter_embeddings::CacheStats;
use arbiter_routing::{BackendSnapshot, Outcome, ScoreBreakdown};

pub fn outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Answer { text, .. } => text.clone(),
        Outcome::NoUsableResponse { backend, reason } => {
            format!("(no usable response from {backend}: {reason})")
        }
    }
}

/// One line per scoring term that contributed
pub fn score(score: &ScoreBreakdown) -> String {
    let mut lines = vec![format!("score {:.2}", score.total), format!("  baseline      {:+.2}", score.baseline)];

    let terms = [
        ("overlap", score.overlap_term),
        ("technical", score.technical_bonus),
        ("type", score.type_match),
        ("repetition", -score.repetition_penalty),
        ("generic", -score.generic_penalty),
        ("uncertainty", -score.uncertainty_penalty),
        ("coherence", -score.coherence_penalty),
        ("semantic", score.semantic_term),
    ];

    lines.extend(
        terms
            .iter()
            .filter(|(_, value)| value.abs() > f64::EPSILON)
            .map(|(name, value)| format!("  {name:<13} {value:+.2}")),
    );

    lines.join("\n")
}

/// Per-backend performance, the answer to `!stats`
pub fn stats(snapshots: &[BackendSnapshot], cache: Option<CacheStats>) -> String {
    if snapshots.is_empty() {
        return "no requests yet".to_owned();
    }

    let mut lines: Vec<String> = snapshots.iter().map(backend_line).collect();

    if let Some(cache) = cache {
        lines.push(format!(
            "embeddings cache: {} hits, {} misses, {} entries",
            cache.hits, cache.misses, cache.entries
        ));
    }

    lines.join("\n")
}

fn backend_line(snapshot: &BackendSnapshot) -> String {
    let success = snapshot
        .success_ratio
        .map_or_else(|| "n/a".to_owned(), |ratio| format!("{:.1}%", ratio * 100.0));

    let mut line = format!(
        "{}: {} requests, {} failed, {} success, {} escalations",
        snapshot.backend, snapshot.requests, snapshot.failed, success, snapshot.escalations
    );

    if let Some(latency) = &snapshot.latency {
        line.push_str(&format!(
            ", latency avg {} min {} max {} p50 {} p95 {} over {} samples",
            millis(latency.average),
            millis(latency.min),
            millis(latency.max),
            millis(latency.p50),
            millis(latency.p95),
            latency.samples
        ));
    }

    line
}

fn millis(duration: Duration) -> String {
    format!("{}ms", duration.as_millis())
}
