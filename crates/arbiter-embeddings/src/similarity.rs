use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arbiter_config::EmbeddingsConfig;
use arbiter_routing::SimilarityScorer;
use async_trait::async_trait;
use mini_moka::sync::Cache;

use crate::client::EmbeddingsClient;

/// Cosine similarity of two embeddings, clamped to `0.0..=1.0`
///
/// `None` when the vectors differ in length or either has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0_f64, 0.0_f64, 0.0_f64);
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a <= 0.0 || norm_b <= 0.0 {
        return None;
    }

    Some((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(0.0, 1.0))
}

/// Embeddings are shared by texts that differ only in case or padding
fn cache_key(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Counters for the embedding cache
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: u64,
}

/// Similarity backed by an embeddings endpoint and an LRU cache
pub struct EmbeddingSimilarity {
    client: EmbeddingsClient,
    cache: Cache<String, Arc<Vec<f32>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl EmbeddingSimilarity {
    pub fn new(config: &EmbeddingsConfig) -> Self {
        Self {
            client: EmbeddingsClient::new(config),
            cache: Cache::builder().max_capacity(config.cache_capacity).build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache counters since startup
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.cache.entry_count(),
        }
    }

    async fn embedding(&self, text: &str) -> Option<Arc<Vec<f32>>> {
        let key = cache_key(text);
        if key.is_empty() {
            return None;
        }

        if let Some(vector) = self.cache.get(&key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            return Some(vector);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);

        match self.client.embed(&[key.as_str()]).await {
            Ok(mut vectors) => {
                let vector = Arc::new(vectors.pop()?);
                self.cache.insert(key, Arc::clone(&vector));
                Some(vector)
            }
            Err(e) => {
                tracing::warn!(model = self.client.model(), error = %e, "embedding failed");
                None
            }
        }
    }
}

#[async_trait]
impl SimilarityScorer for EmbeddingSimilarity {
    async fn similarity(&self, a: &str, b: &str) -> Option<f64> {
        let left = self.embedding(a).await?;
        let right = self.embedding(b).await?;

        let similarity = cosine_similarity(&left, &right);
        if similarity.is_none() {
            tracing::warn!(model = self.client.model(), "embeddings are not comparable");
        }
        similarity
    }
}

impl std::fmt::Debug for EmbeddingSimilarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingSimilarity")
            .field("client", &self.client)
            .field("stats", &self.stats())
            .finish()
    }
}
