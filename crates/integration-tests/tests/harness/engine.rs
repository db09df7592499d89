//! The orchestrator wired the same way the binary wires it

use std::sync::Arc;

use arbiter_config::{Config, Mode};
use arbiter_embeddings::EmbeddingSimilarity;
use arbiter_llm::BackendSet;
use arbiter_routing::{
    AnswerRequest, BackendSnapshot, NoopSimilarity, Orchestrator, Outcome, PerformanceTracker, SimilarityScorer,
    TrackedBackend,
};
use tokio_util::sync::CancellationToken;

pub struct TestEngine {
    pub orchestrator: Orchestrator,
    pub embeddings: Option<Arc<EmbeddingSimilarity>>,
}

impl TestEngine {
    pub fn new(config: &Config) -> Self {
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

        let orchestrator =
            Orchestrator::new(backends, &config.policy, similarity, tracker).expect("orchestrator builds");

        Self {
            orchestrator,
            embeddings,
        }
    }

    pub async fn ask(&self, question: &str, mode: Mode) -> Outcome {
        self.ask_with_context(question, Vec::new(), mode).await
    }

    pub async fn ask_with_context(&self, question: &str, context: Vec<String>, mode: Mode) -> Outcome {
        self.orchestrator
            .answer(
                AnswerRequest::new(question, mode).with_context(context),
                &CancellationToken::new(),
            )
            .await
            .expect("request completes")
    }

    pub fn stats(&self, backend: &str) -> Option<BackendSnapshot> {
        self.orchestrator.tracker().snapshot(backend)
    }
}
