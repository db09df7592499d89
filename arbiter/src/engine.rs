use std::sync::Arc;

use anyhow::Context;
use arbiter_config::{Config, Mode};
use arbiter_embeddings::EmbeddingSimilarity;
use arbiter_llm::BackendSet;
use arbiter_routing::{
    AnswerRequest, NoopSimilarity, Orchestrator, OrchestratorError, Outcome, PerformanceTracker, SimilarityScorer,
    TrackedBackend,
};
use tokio_util::sync::CancellationToken;

use crate::report;

/// Everything a front end needs to answer questions
pub struct Engine {
    orchestrator: Orchestrator,
    embeddings: Option<Arc<EmbeddingSimilarity>>,
    mode: Mode,
}

impl Engine {
    /// Wire backends, tracking and similarity from the loaded config
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let tracker = Arc::new(PerformanceTracker::new(config.policy.latency_window));
        let backends = BackendSet::from_config(&config.backends).map(|backend| TrackedBackend::wrap(backend, &tracker));

        let embeddings = config
            .embeddings
            .as_ref()
            .filter(|_| config.policy.semantic.enabled)
            .map(|embeddings| Arc::new(EmbeddingSimilarity::new(embeddings)));

        let similarity: Arc<dyn SimilarityScorer> = match &embeddings {
            Some(embeddings) => Arc::clone(embeddings) as Arc<dyn SimilarityScorer>,
            None => Arc::new(NoopSimilarity),
        };

        let orchestrator = Orchestrator::new(backends, &config.policy, similarity, tracker)
            .context("failed to build orchestrator")?;

        tracing::debug!(
            orchestrator = ?orchestrator,
            semantic = embeddings.is_some(),
            "engine ready"
        );

        Ok(Self {
            orchestrator,
            embeddings,
            mode: config.mode,
        })
    }

    /// Mode used when a request does not override it
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    pub async fn ask(&self, request: AnswerRequest, cancel: &CancellationToken) -> Result<Outcome, OrchestratorError> {
        self.orchestrator.answer(request, cancel).await
    }

    /// Human-readable performance report
    pub fn stats(&self) -> String {
        report::stats(
            &self.orchestrator.tracker().snapshots(),
            self.embeddings.as_ref().map(|e| e.stats()),
        )
    }
}
