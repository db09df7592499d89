//! Response quality gating and backend fallback for Arbiter
//!
//! A request flows through these stages:
//! - **Retry**: re-invoke a backend while it answers with nothing
//! - **Validation**: structural limits on length, lists, sentences and markup
//! - **Scoring**: weighted relevance and coherence signals combined into `[0, 1]`
//! - **Orchestration**: escalate from the local to the remote backend when
//!   the local answer is missing, invalid or scores too low
//!
//! The [`PerformanceTracker`] observes every attempt but never decides.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod analysis;
pub mod coherence;
pub mod error;
pub mod feedback;
pub mod orchestrator;
pub mod retry;
pub mod scoring;
pub mod semantic;
pub mod validation;

pub use analysis::{Question, QuestionType};
pub use coherence::Incoherence;
pub use error::{OrchestratorError, RoutingError};
pub use feedback::{BackendSnapshot, LatencySummary, PerformanceTracker, TrackedBackend};
pub use orchestrator::{AnswerRequest, FailureReason, Orchestrator, Outcome};
pub use retry::{Attempt, AttemptOutcome, RetryController};
pub use scoring::{QualityScorer, ScoreBreakdown};
pub use semantic::{NoopSimilarity, SimilarityScorer};
pub use validation::{Rejection, Validator};
