//! Mock model server for integration tests
//!
//! Implements the OpenAI-compatible chat completion and embeddings routes.
//! Completions replay a script of replies, then repeat a default reply.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router, routing};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// One scripted completion reply
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    /// `content: null`
    Null,
    /// Error status with an OpenAI-style error body
    Status(u16),
    /// Wait before answering with the given text
    Delayed(Duration, String),
}

impl Reply {
    pub fn text(content: &str) -> Self {
        Self::Text(content.to_owned())
    }
}

/// Mock backend that answers from a script
pub struct MockLlm {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockLlmState>,
}

struct MockLlmState {
    completion_count: AtomicU32,
    embedding_count: AtomicU32,
    script: Mutex<VecDeque<Reply>>,
    default_reply: Reply,
    fail_embeddings: AtomicBool,
    last_system_prompt: Mutex<Option<String>>,
}

impl MockLlm {
    /// Start a mock that always answers with a fixed greeting
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_scripted(Vec::new(), Reply::text("Hello from mock LLM")).await
    }

    /// Start a mock that always answers with `content`
    pub async fn start_with_response(content: &str) -> anyhow::Result<Self> {
        Self::start_scripted(Vec::new(), Reply::text(content)).await
    }

    /// Start a mock that plays `script` in order, then repeats `default_reply`
    pub async fn start_scripted(script: Vec<Reply>, default_reply: Reply) -> anyhow::Result<Self> {
        let state = Arc::new(MockLlmState {
            completion_count: AtomicU32::new(0),
            embedding_count: AtomicU32::new(0),
            script: Mutex::new(script.into()),
            default_reply,
            fail_embeddings: AtomicBool::new(false),
            last_system_prompt: Mutex::new(None),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat_completions))
            .route("/v1/embeddings", routing::post(handle_embeddings))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL including `/v1`, as a backend or embeddings `base_url`
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn completion_count(&self) -> u32 {
        self.state.completion_count.load(Ordering::Relaxed)
    }

    pub fn embedding_count(&self) -> u32 {
        self.state.embedding_count.load(Ordering::Relaxed)
    }

    /// Answer every embeddings request with a 500
    pub fn fail_embeddings(&self) {
        self.state.fail_embeddings.store(true, Ordering::Relaxed);
    }

    /// System message of the most recent completion request
    pub fn last_system_prompt(&self) -> Option<String> {
        self.state.last_system_prompt.lock().unwrap().clone()
    }
}

impl Drop for MockLlm {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Deterministic embedding: letter frequencies of the lower-cased text
pub fn letter_embedding(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0_f32; 26];
    for c in text.to_lowercase().chars().filter(char::is_ascii_lowercase) {
        vector[(c as u8 - b'a') as usize] += 1.0;
    }
    vector
}

// -- Wire types matching OpenAI format --

#[derive(Debug, Deserialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct ChatCompletionResponse {
    id: String,
    object: String,
    created: u64,
    model: String,
    choices: Vec<Choice>,
}

#[derive(Debug, Serialize)]
struct Choice {
    index: u32,
    message: ResponseMessage,
    finish_reason: String,
}

#[derive(Debug, Serialize)]
struct ResponseMessage {
    role: String,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRequest {
    input: Vec<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingResponse {
    object: String,
    data: Vec<EmbeddingData>,
    model: String,
}

#[derive(Debug, Serialize)]
struct EmbeddingData {
    object: String,
    embedding: Vec<f32>,
    index: usize,
}

// -- Handlers --

fn error_response(status: StatusCode) -> axum::response::Response {
    (
        status,
        Json(serde_json::json!({
            "error": {
                "message": "mock server intentional failure",
                "type": "server_error"
            }
        })),
    )
        .into_response()
}

async fn handle_chat_completions(
    State(state): State<Arc<MockLlmState>>,
    Json(req): Json<ChatCompletionRequest>,
) -> axum::response::Response {
    state.completion_count.fetch_add(1, Ordering::Relaxed);

    let system = req
        .messages
        .iter()
        .find(|m| m.role == "system")
        .and_then(|m| m.content.clone());
    *state.last_system_prompt.lock().unwrap() = system;

    let reply = state
        .script
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| state.default_reply.clone());

    let content = match reply {
        Reply::Text(text) => Some(text),
        Reply::Null => None,
        Reply::Status(code) => {
            return error_response(StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
        }
        Reply::Delayed(delay, text) => {
            tokio::time::sleep(delay).await;
            Some(text)
        }
    };

    Json(ChatCompletionResponse {
        id: "chatcmpl-test-123".to_owned(),
        object: "chat.completion".to_owned(),
        created: 1_700_000_000,
        model: req.model,
        choices: vec![Choice {
            index: 0,
            message: ResponseMessage {
                role: "assistant".to_owned(),
                content,
            },
            finish_reason: "stop".to_owned(),
        }],
    })
    .into_response()
}

async fn handle_embeddings(
    State(state): State<Arc<MockLlmState>>,
    Json(req): Json<EmbeddingRequest>,
) -> axum::response::Response {
    state.embedding_count.fetch_add(1, Ordering::Relaxed);

    if state.fail_embeddings.load(Ordering::Relaxed) {
        return error_response(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let data = req
        .input
        .iter()
        .enumerate()
        .map(|(index, text)| EmbeddingData {
            object: "embedding".to_owned(),
            embedding: letter_embedding(text),
            index,
        })
        .collect();

    Json(EmbeddingResponse {
        object: "list".to_owned(),
        data,
        model: req.model,
    })
    .into_response()
}
