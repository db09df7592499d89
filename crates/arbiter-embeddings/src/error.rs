use thiserror::Error;

/// Errors from the embeddings endpoint
#[derive(Debug, Error)]
pub enum EmbeddingsError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("embeddings API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid embeddings response: {0}")]
    Protocol(String),
}

impl From<reqwest::Error> for EmbeddingsError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Protocol(e.to_string())
        } else {
            Self::Connection(e.to_string())
        }
    }
}
