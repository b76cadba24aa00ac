//! Summarizer (C4): reduces fetched page text to a bounded bullet summary
//! via one Gateway call (spec §4.4). Input text is truncated before the
//! prompt is built so a single oversized page can't blow the provider's
//! context window.

use std::sync::Arc;

use crate::errors::AppError;
use crate::gateway::Gateway;
use crate::provider::{CallParams, ChatMessage, ChatRole};

const MAX_INPUT_CHARS: usize = 12_000;
const MAX_SUMMARY_TOKENS: u32 = 300;

pub struct Summarizer {
    gateway: Arc<Gateway>,
}

impl Summarizer {
    pub fn new(gateway: Arc<Gateway>) -> Self {
        Self { gateway }
    }

    /// Produce a short bullet summary of `text` in the context of `topic`.
    pub async fn summarize(&self, topic: &str, text: &str) -> Result<String, AppError> {
        let truncated: String = text.chars().take(MAX_INPUT_CHARS).collect();
        let messages = vec![
            ChatMessage {
                role: ChatRole::System,
                content: "You summarize web page content into 3-5 terse factual bullet points \
                          relevant to the given topic. Do not editorialize."
                    .to_string(),
            },
            ChatMessage {
                role: ChatRole::User,
                content: format!(
                    "Topic: {topic}\n\nPage content:\n{truncated}\n\nSummarize in bullet points."
                ),
            },
        ];
        let params = CallParams {
            max_tokens: Some(MAX_SUMMARY_TOKENS),
            temperature: Some(0.2),
        };
        let result = self
            .gateway
            .call(&messages, &params)
            .await
            .map_err(|e| AppError::ProviderUnavailable(e.to_string()))?;
        Ok(result.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    #[tokio::test]
    async fn summarize_returns_provider_text() {
        let gw = Arc::new(Gateway::new(vec![Arc::new(MockProvider::always_ok(
            "p1",
            "- point one\n- point two",
        ))]));
        let summarizer = Summarizer::new(gw);
        let summary = summarizer.summarize("topic", "some page text").await.unwrap();
        assert!(summary.contains("point one"));
    }
}
