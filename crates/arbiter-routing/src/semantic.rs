use async_trait::async_trait;

/// Optional embedding-based similarity used by the scorer
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    /// Similarity of two texts in `0.0..=1.0`, or `None` when unavailable
    async fn similarity(&self, a: &str, b: &str) -> Option<f64>;
}

/// Similarity capability for deployments without embeddings
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSimilarity;

#[async_trait]
impl SimilarityScorer for NoopSimilarity {
    async fn similarity(&self, _a: &str, _b: &str) -> Option<f64> {
        None
    }
}
