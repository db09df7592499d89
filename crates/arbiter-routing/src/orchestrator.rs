//! Sequencing of backends for one request
//!
//! Single-backend modes return whatever validates. In fallback mode the
//! local candidate must also clear the acceptance threshold, otherwise the
//! request escalates to the remote backend exactly once.

use std::sync::Arc;

use arbiter_config::{LOCAL_BACKEND, Mode, PolicyConfig, REMOTE_BACKEND};
use arbiter_llm::{Backend, BackendError, BackendSet, CompletionRequest};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::analysis::Question;
use crate::error::{OrchestratorError, RoutingError};
use crate::feedback::PerformanceTracker;
use crate::retry::{Attempt, AttemptOutcome, Candidate, RetryController, RetryOutcome};
use crate::scoring::{QualityScorer, ScoreBreakdown};
use crate::semantic::SimilarityScorer;
use crate::validation::{Rejection, Validator};

/// A question to answer and how to route it
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub question: String,
    /// Recent conversation lines, oldest first
    pub context: Vec<String>,
    pub mode: Mode,
}

impl AnswerRequest {
    /// Request with no conversation context
    pub fn new(question: impl Into<String>, mode: Mode) -> Self {
        Self {
            question: question.into(),
            context: Vec::new(),
            mode,
        }
    }

    #[must_use]
    /// Attach recent conversation lines, oldest first
    pub fn with_context(mut self, context: Vec<String>) -> Self {
        self.context = context;
        self
    }
}

/// Final result of a request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Answer {
        text: String,
        backend: String,
        score: ScoreBreakdown,
    },
    /// The last backend consulted produced nothing usable
    NoUsableResponse { backend: String, reason: FailureReason },
}

impl Outcome {
    /// Backend that produced the answer or the terminal failure
    pub fn backend(&self) -> &str {
        match self {
            Self::Answer { backend, .. } | Self::NoUsableResponse { backend, .. } => backend,
        }
    }

    /// Label for logs and the outcome metric
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Answer { .. } => "answer",
            Self::NoUsableResponse { .. } => "no_usable_response",
        }
    }
}

/// Why a backend's run ended without a usable candidate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    #[error("empty response after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error(transparent)]
    Transport(BackendError),

    #[error(transparent)]
    Invalid(Rejection),
}

impl FailureReason {
    /// Label used for metrics and logs
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Exhausted { .. } => "exhausted",
            Self::Transport(error) => error.kind(),
            Self::Invalid(rejection) => rejection.kind(),
        }
    }
}

/// Verdict on one backend before any quality gate
enum Run {
    Valid { text: String, candidate: Candidate },
    Unusable(FailureReason),
}

/// Routes questions across the configured backends
pub struct Orchestrator {
    backends: BackendSet,
    validator: Validator,
    scorer: QualityScorer,
    retry: RetryController,
    tracker: Arc<PerformanceTracker>,
    acceptance_threshold: f64,
}

impl Orchestrator {
    /// Build the pipeline from policy; fails only on invalid banned patterns
    pub fn new(
        backends: BackendSet,
        policy: &PolicyConfig,
        similarity: Arc<dyn SimilarityScorer>,
        tracker: Arc<PerformanceTracker>,
    ) -> Result<Self, RoutingError> {
        Ok(Self {
            backends,
            validator: Validator::new(&policy.validation)?,
            scorer: QualityScorer::new(&policy.scoring, &policy.semantic, similarity),
            retry: RetryController::new(&policy.retry, Arc::clone(&tracker)),
            tracker,
            acceptance_threshold: policy.acceptance_threshold,
        })
    }

    /// Performance tracker shared with the wrapped backends
    pub fn tracker(&self) -> &Arc<PerformanceTracker> {
        &self.tracker
    }

    /// Answer one question
    ///
    /// Returns `Err` only when the request is cancelled or its mode names a
    /// backend that is not configured. Every other failure is an
    /// [`Outcome::NoUsableResponse`].
    pub async fn answer(
        &self,
        request: AnswerRequest,
        cancel: &CancellationToken,
    ) -> Result<Outcome, OrchestratorError> {
        let span = tracing::info_span!("request", request_id = %Uuid::new_v4(), mode = %request.mode);
        self.answer_inner(request, cancel).instrument(span).await
    }

    async fn answer_inner(
        &self,
        request: AnswerRequest,
        cancel: &CancellationToken,
    ) -> Result<Outcome, OrchestratorError> {
        for name in request.mode.backends() {
            self.backend(name)?;
        }

        let question = Question::new(request.question, request.context);
        let completion = CompletionRequest::new(question.text()).with_context(question.context().to_vec());
        tracing::debug!(question_type = %question.kind(), "classified question");

        let mut log = Vec::new();
        let result = match request.mode {
            Mode::LocalOnly => self.single(LOCAL_BACKEND, &question, &completion, cancel, &mut log).await,
            Mode::RemoteOnly => self.single(REMOTE_BACKEND, &question, &completion, cancel, &mut log).await,
            Mode::Fallback => self.fallback(&question, &completion, cancel, &mut log).await,
        };

        for attempt in &log {
            tracing::debug!(
                backend = %attempt.backend,
                attempt = attempt.number,
                outcome = attempt.outcome.kind(),
                elapsed_ms = attempt.elapsed().as_millis(),
                "attempt"
            );
        }

        match &result {
            Ok(outcome) => {
                self.tracker.record_outcome(outcome.backend(), outcome.kind());
                tracing::info!(backend = outcome.backend(), outcome = outcome.kind(), "request complete");
            }
            Err(e) => tracing::info!(error = %e, "request aborted"),
        }

        result
    }

    /// One backend, no threshold gate
    async fn single(
        &self,
        name: &str,
        question: &Question,
        completion: &CompletionRequest,
        cancel: &CancellationToken,
        log: &mut Vec<Attempt>,
    ) -> Result<Outcome, OrchestratorError> {
        let backend = self.backend(name)?;

        match self.run(backend.as_ref(), question, completion, cancel, log).await? {
            Run::Valid { text, candidate } => {
                let score = self.score(&text, question, cancel).await?;
                log.push(candidate.settle(AttemptOutcome::Validated(text.clone())));
                Ok(self.accept(&candidate, text, score))
            }
            Run::Unusable(reason) => Ok(Outcome::NoUsableResponse {
                backend: name.to_owned(),
                reason,
            }),
        }
    }

    async fn fallback(
        &self,
        question: &Question,
        completion: &CompletionRequest,
        cancel: &CancellationToken,
        log: &mut Vec<Attempt>,
    ) -> Result<Outcome, OrchestratorError> {
        let primary = self.backend(LOCAL_BACKEND)?;

        match self.run(primary.as_ref(), question, completion, cancel, log).await? {
            Run::Valid { text, candidate } => {
                let score = self.score(&text, question, cancel).await?;

                if score.total >= self.acceptance_threshold {
                    log.push(candidate.settle(AttemptOutcome::Accepted {
                        text: text.clone(),
                        score: score.total,
                    }));
                    return Ok(self.accept(&candidate, text, score));
                }

                tracing::info!(
                    backend = LOCAL_BACKEND,
                    score = score.total,
                    threshold = self.acceptance_threshold,
                    "score below threshold, escalating"
                );
                self.tracker.record_failure(LOCAL_BACKEND);
                log.push(candidate.settle(AttemptOutcome::Scored(score)));
            }
            Run::Unusable(reason) => {
                tracing::info!(backend = LOCAL_BACKEND, reason = %reason, "no usable response, escalating");
            }
        }

        self.tracker.record_escalation(LOCAL_BACKEND);
        self.single(REMOTE_BACKEND, question, completion, cancel, log).await
    }

    /// Retry until text, then validate it
    async fn run(
        &self,
        backend: &dyn Backend,
        question: &Question,
        completion: &CompletionRequest,
        cancel: &CancellationToken,
        log: &mut Vec<Attempt>,
    ) -> Result<Run, OrchestratorError> {
        let candidate = match self.retry.run(backend, completion, cancel, log).await {
            RetryOutcome::Candidate(candidate) => candidate,
            RetryOutcome::Exhausted { attempts } => {
                return Ok(Run::Unusable(FailureReason::Exhausted { attempts }));
            }
            RetryOutcome::Failed(error) => return Ok(Run::Unusable(FailureReason::Transport(error))),
            RetryOutcome::Cancelled => return Err(OrchestratorError::Cancelled),
        };

        match self.validator.validate(&candidate.text, question.kind()) {
            Ok(text) => Ok(Run::Valid { text, candidate }),
            Err(rejection) => {
                tracing::debug!(
                    backend = backend.name(),
                    attempt = candidate.number,
                    reason = %rejection,
                    "candidate rejected"
                );
                self.tracker.record_failure(backend.name());
                log.push(candidate.settle(AttemptOutcome::Rejected(rejection.clone())));
                Ok(Run::Unusable(FailureReason::Invalid(rejection)))
            }
        }
    }

    async fn score(
        &self,
        text: &str,
        question: &Question,
        cancel: &CancellationToken,
    ) -> Result<ScoreBreakdown, OrchestratorError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(OrchestratorError::Cancelled),
            score = self.scorer.score(text, question) => Ok(score),
        }
    }

    fn accept(&self, candidate: &Candidate, text: String, score: ScoreBreakdown) -> Outcome {
        self.tracker.record_success(&candidate.backend);

        Outcome::Answer {
            text,
            backend: candidate.backend.clone(),
            score,
        }
    }

    fn backend(&self, name: &str) -> Result<&Arc<dyn Backend>, OrchestratorError> {
        self.backends
            .get(name)
            .ok_or_else(|| OrchestratorError::BackendNotConfigured {
                backend: name.to_owned(),
            })
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("backends", &self.backends)
            .field("retry", &self.retry)
            .field("acceptance_threshold", &self.acceptance_threshold)
            .finish_non_exhaustive()
    }
}
