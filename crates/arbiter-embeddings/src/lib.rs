//! Embedding-based similarity for Arbiter's quality scorer
//!
//! Texts are embedded through an OpenAI-compatible `/embeddings` route and
//! compared by cosine similarity. Embeddings are cached, so re-scoring the
//! same question costs one request at most.

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

mod client;
mod error;
mod similarity;

pub use client::EmbeddingsClient;
pub use error::EmbeddingsError;
pub use similarity::{CacheStats, EmbeddingSimilarity, cosine_similarity};
