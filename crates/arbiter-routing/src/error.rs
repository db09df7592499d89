//! Routing error types

use thiserror::Error;

/// Errors raised while building routing components
#[derive(Debug, Error)]
pub enum RoutingError {
    /// A banned-markup pattern failed to compile
    #[error("invalid regex pattern: {0}")]
    InvalidPattern(String),
}

/// Errors that abort a request before an outcome is reached
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestratorError {
    /// The caller's cancellation token fired
    #[error("request cancelled")]
    Cancelled,

    /// The requested mode needs a backend that is not configured
    #[error("backend not configured: {backend}")]
    BackendNotConfigured { backend: String },
}
