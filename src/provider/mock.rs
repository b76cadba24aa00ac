//! In-memory [`Provider`] used by gateway and orchestrator tests — never
//! compiled into the production binary's default provider set.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;

use super::{CallParams, ChatMessage, Chunk, ChunkStream, CompletionResult, Provider, ProviderError};

pub struct MockProvider {
    id: String,
    responses: Vec<Result<String, ProviderError>>,
    cursor: AtomicUsize,
}

impl MockProvider {
    pub fn new(id: impl Into<String>, responses: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            id: id.into(),
            responses,
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn always_ok(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(id, vec![Ok(text.into())])
    }

    pub fn always_err(id: impl Into<String>, err: ProviderError) -> Self {
        Self::new(id, vec![Err(err)])
    }

    fn next(&self) -> Result<String, ProviderError> {
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.responses[i.min(self.responses.len() - 1)].clone()
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn id(&self) -> &str {
        &self.id
    }

    async fn healthy(&self) -> bool {
        true
    }

    async fn call(
        &self,
        _messages: &[ChatMessage],
        _params: &CallParams,
    ) -> Result<CompletionResult, ProviderError> {
        let text = self.next()?;
        Ok(CompletionResult {
            text,
            tokens_in: 10,
            tokens_out: 10,
            latency_ms: 1,
            provider_id: self.id.clone(),
            credential_id: "mock".to_string(),
        })
    }

    async fn stream(
        &self,
        _messages: &[ChatMessage],
        _params: &CallParams,
    ) -> Result<ChunkStream, ProviderError> {
        let text = self.next()?;
        let chunks = vec![
            Ok(Chunk {
                delta_text: text,
                done: false,
                finish_reason: None,
            }),
            Ok(Chunk {
                delta_text: String::new(),
                done: true,
                finish_reason: Some("stop".to_string()),
            }),
        ];
        Ok(Box::pin(stream::iter(chunks)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_ok_returns_configured_text() {
        let p = MockProvider::always_ok("m1", "hello");
        let result = p.call(&[], &CallParams::default()).await.unwrap();
        assert_eq!(result.text, "hello");
    }

    #[tokio::test]
    async fn always_err_propagates_error() {
        let p = MockProvider::always_err("m1", ProviderError::RateLimit);
        let err = p.call(&[], &CallParams::default()).await.unwrap_err();
        assert!(matches!(err, ProviderError::RateLimit));
    }
}
