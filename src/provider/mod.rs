//! Provider Adapter (C1): speaks to one LLM backend, rotates credentials,
//! and surfaces typed errors — never raising across the abstraction (spec
//! §4.1, §9 "duck-typed providers").

pub mod credentials;
pub mod http;
pub mod mock;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

pub use credentials::CredentialPool;
pub use http::HttpProvider;
pub use mock::MockProvider;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Default)]
pub struct CallParams {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct CompletionResult {
    pub text: String,
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub latency_ms: u64,
    pub provider_id: String,
    pub credential_id: String,
}

#[derive(Debug, Clone)]
pub struct Chunk {
    pub delta_text: String,
    pub done: bool,
    pub finish_reason: Option<String>,
}

/// Errors the adapter returns (spec §4.1). Never raised to the Gateway's
/// caller without classification — the Gateway interprets these to decide
/// fallback vs. terminal failure (spec §4.2).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("rate limited")]
    RateLimit,
    #[error("auth error")]
    AuthError,
    #[error("timeout")]
    Timeout,
    #[error("transient network error: {0}")]
    TransientNetwork(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("content filtered")]
    ContentFilter,
    #[error("server error: {0}")]
    ServerError(String),
    #[error("unknown error: {0}")]
    Unknown(String),
}

impl ProviderError {
    /// Whether the Gateway should advance to the next provider on this
    /// error (spec §4.2): it does NOT advance on `bad_request` or
    /// `content_filter` — those are terminal.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            ProviderError::BadRequest(_) | ProviderError::ContentFilter
        )
    }
}

pub type ChunkStream = BoxStream<'static, Result<Chunk, ProviderError>>;

/// The capability set every backend implements (spec §9 "duck-typed
/// providers" — modeled here as one trait with concrete variants).
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> &str;

    async fn healthy(&self) -> bool;

    async fn call(
        &self,
        messages: &[ChatMessage],
        params: &CallParams,
    ) -> Result<CompletionResult, ProviderError>;

    async fn stream(
        &self,
        messages: &[ChatMessage],
        params: &CallParams,
    ) -> Result<ChunkStream, ProviderError>;
}
