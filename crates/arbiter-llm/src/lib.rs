//! Model backends for Arbiter
//!
//! A backend turns a question into raw text. It never panics and never
//! returns `Err`: transport failures are values of [`RawResult`].

#![allow(clippy::must_use_candidate, clippy::missing_errors_doc)]

pub mod backend;
pub mod error;
pub mod openai;
pub mod prompt;
mod protocol;

pub use backend::{Backend, BackendSet, CompletionRequest, RawResult};
pub use error::BackendError;
pub use openai::OpenAiBackend;
