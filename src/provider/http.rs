//! Generic HTTP-backed [`Provider`] for OpenAI-compatible chat completion
//! APIs. Grounded in the teacher's `proxy::upstream::UpstreamClient`
//! (reqwest-middleware retry wrapper) and `proxy::stream_bridge` (SSE
//! passthrough) — adapted here to terminate in typed [`ProviderError`]s
//! instead of forwarding raw bytes to an HTTP client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::{self, StreamExt};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde_json::json;

use super::credentials::CredentialPool;
use super::{CallParams, ChatMessage, ChatRole, Chunk, ChunkStream, CompletionResult, Provider, ProviderError};

/// Static shape of one backend: base URL, model name, and how the
/// credential is attached. Distinct providers in `provider_order` (spec
/// §6 `PROVIDER_ORDER`) are distinct `ProviderProfile` instances.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub id: String,
    pub base_url: String,
    pub model: String,
    pub auth_header: String,
    pub auth_prefix: String,
}

pub struct HttpProvider {
    profile: ProviderProfile,
    credentials: CredentialPool,
    client: ClientWithMiddleware,
}

impl HttpProvider {
    pub fn new(profile: ProviderProfile, credentials: CredentialPool) -> Self {
        let base = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(16)
            .timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("failed to build HTTP client");
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(2);
        let client = ClientBuilder::new(base)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        Self {
            profile,
            credentials,
            client,
        }
    }

    fn body(&self, messages: &[ChatMessage], params: &CallParams, stream: bool) -> serde_json::Value {
        let msgs: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                json!({
                    "role": match m.role {
                        ChatRole::System => "system",
                        ChatRole::User => "user",
                        ChatRole::Assistant => "assistant",
                    },
                    "content": m.content,
                })
            })
            .collect();
        let mut body = json!({
            "model": self.profile.model,
            "messages": msgs,
            "stream": stream,
        });
        if let Some(max_tokens) = params.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(temperature) = params.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }

    fn classify_status(status: reqwest::StatusCode, body: &str) -> ProviderError {
        match status.as_u16() {
            401 | 403 => ProviderError::AuthError,
            429 => ProviderError::RateLimit,
            400 | 404 | 422 => ProviderError::BadRequest(body.to_string()),
            408 => ProviderError::Timeout,
            500..=599 => ProviderError::ServerError(body.to_string()),
            _ => ProviderError::Unknown(format!("status {}: {}", status, body)),
        }
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn id(&self) -> &str {
        &self.profile.id
    }

    async fn healthy(&self) -> bool {
        !self.credentials.is_empty() && self.credentials.select().is_some()
    }

    async fn call(
        &self,
        messages: &[ChatMessage],
        params: &CallParams,
    ) -> Result<CompletionResult, ProviderError> {
        let (cred_idx, secret) = self
            .credentials
            .select()
            .ok_or(ProviderError::AuthError)?;
        let secret = secret.to_string();
        let started = Instant::now();

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.profile.base_url))
            .header(
                self.profile.auth_header.as_str(),
                format!("{}{}", self.profile.auth_prefix, secret),
            )
            .json(&self.body(messages, params, false))
            .send()
            .await
            .map_err(|e| ProviderError::TransientNetwork(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let err = Self::classify_status(status, &text);
            if matches!(err, ProviderError::RateLimit | ProviderError::AuthError) {
                self.credentials.record_failure(cred_idx);
            }
            return Err(err);
        }

        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::Unknown(e.to_string()))?;

        self.credentials.record_success(cred_idx);

        let text = value["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let tokens_in = value["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32;
        let tokens_out = value["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32;

        Ok(CompletionResult {
            text,
            tokens_in,
            tokens_out,
            latency_ms: started.elapsed().as_millis() as u64,
            provider_id: self.profile.id.clone(),
            credential_id: cred_idx.to_string(),
        })
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        params: &CallParams,
    ) -> Result<ChunkStream, ProviderError> {
        let (cred_idx, secret) = self
            .credentials
            .select()
            .ok_or(ProviderError::AuthError)?;
        let secret = secret.to_string();

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.profile.base_url))
            .header(
                self.profile.auth_header.as_str(),
                format!("{}{}", self.profile.auth_prefix, secret),
            )
            .json(&self.body(messages, params, true))
            .send()
            .await
            .map_err(|e| ProviderError::TransientNetwork(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let err = Self::classify_status(status, &text);
            if matches!(err, ProviderError::RateLimit | ProviderError::AuthError) {
                self.credentials.record_failure(cred_idx);
            }
            return Err(err);
        }

        self.credentials.record_success(cred_idx);

        let event_stream = resp.bytes_stream().eventsource();
        let mapped = event_stream.flat_map(|item| {
            let chunk = match item {
                Ok(event) => {
                    if event.data == "[DONE]" {
                        Some(Ok(Chunk {
                            delta_text: String::new(),
                            done: true,
                            finish_reason: None,
                        }))
                    } else {
                        match serde_json::from_str::<serde_json::Value>(&event.data) {
                            Ok(v) => {
                                let delta = v["choices"][0]["delta"]["content"]
                                    .as_str()
                                    .unwrap_or_default()
                                    .to_string();
                                let finish_reason = v["choices"][0]["finish_reason"]
                                    .as_str()
                                    .map(|s| s.to_string());
                                let done = finish_reason.is_some();
                                Some(Ok(Chunk {
                                    delta_text: delta,
                                    done,
                                    finish_reason,
                                }))
                            }
                            Err(_) => None,
                        }
                    }
                }
                Err(e) => Some(Err(ProviderError::TransientNetwork(e.to_string()))),
            };
            stream::iter(chunk)
        });

        Ok(Box::pin(mapped))
    }
}
