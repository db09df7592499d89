//! Bounded re-invocation of one backend on empty responses
//!
//! Only an empty answer is retried. Transport errors end the run at once
//! and anything non-blank is handed back for validation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arbiter_config::RetryPolicy;
use arbiter_llm::{Backend, BackendError, CompletionRequest, RawResult};
use tokio_util::sync::CancellationToken;

use crate::feedback::PerformanceTracker;
use crate::scoring::ScoreBreakdown;
use crate::validation::Rejection;

/// What happened to one attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Empty,
    Error(BackendError),
    /// Passed validation and returned without a threshold gate
    Validated(String),
    Rejected(Rejection),
    /// Validated but scored under the acceptance threshold
    Scored(ScoreBreakdown),
    Accepted { text: String, score: f64 },
}

impl AttemptOutcome {
    /// Short label for logs
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Error(_) => "error",
            Self::Validated(_) => "validated",
            Self::Rejected(_) => "rejected",
            Self::Scored(_) => "below_threshold",
            Self::Accepted { .. } => "accepted",
        }
    }
}

/// One invocation of one backend
#[derive(Debug, Clone)]
pub struct Attempt {
    pub backend: String,
    /// 1-based, counted per backend
    pub number: u32,
    pub started: Instant,
    pub finished: Instant,
    pub outcome: AttemptOutcome,
}

impl Attempt {
    /// Wall-clock time of the invocation
    pub fn elapsed(&self) -> Duration {
        self.finished.duration_since(self.started)
    }
}

/// A non-blank answer whose attempt still awaits a verdict
#[derive(Debug)]
pub struct Candidate {
    pub text: String,
    pub backend: String,
    pub number: u32,
    started: Instant,
    finished: Instant,
}

impl Candidate {
    /// Close the attempt with its final outcome
    pub fn settle(&self, outcome: AttemptOutcome) -> Attempt {
        Attempt {
            backend: self.backend.clone(),
            number: self.number,
            started: self.started,
            finished: self.finished,
            outcome,
        }
    }
}

/// Terminal state of a retry run
#[derive(Debug)]
pub enum RetryOutcome {
    Candidate(Candidate),
    /// Every attempt came back empty
    Exhausted { attempts: u32 },
    Failed(BackendError),
    Cancelled,
}

/// Re-invokes a backend while it answers with nothing
#[derive(Debug, Clone)]
pub struct RetryController {
    max_attempts: u32,
    delay: Duration,
    tracker: Arc<PerformanceTracker>,
}

impl RetryController {
    /// Controller allowing at least one attempt per backend
    pub fn new(policy: &RetryPolicy, tracker: Arc<PerformanceTracker>) -> Self {
        Self {
            max_attempts: policy.max_attempts.max(1),
            delay: policy.delay,
            tracker,
        }
    }

    /// Invoke `backend` until it returns text, fails, or runs out of attempts
    ///
    /// Settled attempts are appended to `log`. Empty answers and transport
    /// errors are counted as failures here; the caller records the verdict
    /// on a returned candidate.
    pub async fn run(
        &self,
        backend: &dyn Backend,
        request: &CompletionRequest,
        cancel: &CancellationToken,
        log: &mut Vec<Attempt>,
    ) -> RetryOutcome {
        let name = backend.name();

        for number in 1..=self.max_attempts {
            if number > 1 && !self.delay.is_zero() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return RetryOutcome::Cancelled,
                    () = tokio::time::sleep(self.delay) => {}
                }
            }

            let started = Instant::now();
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return RetryOutcome::Cancelled,
                result = backend.invoke(request, backend.timeout()) => result,
            };
            let finished = Instant::now();

            let settle = |outcome| Attempt {
                backend: name.to_owned(),
                number,
                started,
                finished,
                outcome,
            };

            match result {
                RawResult::Text(text) if !text.trim().is_empty() => {
                    return RetryOutcome::Candidate(Candidate {
                        text,
                        backend: name.to_owned(),
                        number,
                        started,
                        finished,
                    });
                }
                RawResult::Text(_) | RawResult::Empty => {
                    tracing::debug!(backend = name, attempt = number, "empty response");
                    self.tracker.record_failure(name);
                    log.push(settle(AttemptOutcome::Empty));
                }
                RawResult::Error(error) => {
                    tracing::warn!(backend = name, attempt = number, error = %error, "backend call failed");
                    self.tracker.record_failure(name);
                    log.push(settle(AttemptOutcome::Error(error.clone())));
                    return RetryOutcome::Failed(error);
                }
            }
        }

        tracing::warn!(backend = name, attempts = self.max_attempts, "retries exhausted");
        RetryOutcome::Exhausted {
            attempts: self.max_attempts,
        }
    }
}
