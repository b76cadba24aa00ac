//! LLM Gateway (C2): tries providers in a fixed order, advancing on
//! recoverable errors, stopping on the first success or a terminal error
//! (spec §4.2). Metrics follow the teacher's `middleware::metrics`
//! pattern — a `CounterVec`/`HistogramVec` pair — but registered into a
//! `Registry` private to this `Gateway` (spec §4.2 "registered once in
//! AppState... read-only accessor returns a snapshot, never the live
//! registry") rather than Prometheus's global default registry, so more
//! than one `Gateway` can exist in a process (tests build one per case)
//! without a duplicate-registration panic.

use std::sync::Arc;
use std::time::Instant;

use prometheus::{opts, proto::MetricFamily, CounterVec, HistogramVec, Registry};

use crate::provider::{CallParams, ChatMessage, ChunkStream, CompletionResult, Provider, ProviderError};

pub struct GatewayMetrics {
    registry: Registry,
    calls_total: CounterVec,
    errors_total: CounterVec,
    latency_seconds: HistogramVec,
}

impl GatewayMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let calls_total = CounterVec::new(
            opts!("symposium_provider_calls_total", "Total provider call attempts"),
            &["provider", "outcome"],
        )
        .expect("symposium_provider_calls_total has a valid, static metric definition");
        registry
            .register(Box::new(calls_total.clone()))
            .expect("symposium_provider_calls_total is only ever registered once per registry");

        let errors_total = CounterVec::new(
            opts!("symposium_provider_errors_total", "Provider errors by kind"),
            &["provider", "error_kind"],
        )
        .expect("symposium_provider_errors_total has a valid, static metric definition");
        registry
            .register(Box::new(errors_total.clone()))
            .expect("symposium_provider_errors_total is only ever registered once per registry");

        let latency_seconds = HistogramVec::new(
            prometheus::histogram_opts!(
                "symposium_provider_latency_seconds",
                "Provider call latency in seconds",
                vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
            ),
            &["provider"],
        )
        .expect("symposium_provider_latency_seconds has a valid, static metric definition");
        registry
            .register(Box::new(latency_seconds.clone()))
            .expect("symposium_provider_latency_seconds is only ever registered once per registry");

        Self {
            registry,
            calls_total,
            errors_total,
            latency_seconds,
        }
    }

    /// A point-in-time snapshot of this Gateway's metric families — never
    /// the live `Registry` itself, so a caller can't register into or
    /// otherwise mutate it.
    pub fn snapshot(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    fn record_success(&self, provider_id: &str, elapsed_secs: f64) {
        self.calls_total.with_label_values(&[provider_id, "ok"]).inc();
        self.latency_seconds.with_label_values(&[provider_id]).observe(elapsed_secs);
    }

    fn record_error(&self, provider_id: &str, err: &ProviderError) {
        self.calls_total.with_label_values(&[provider_id, "error"]).inc();
        self.errors_total
            .with_label_values(&[provider_id, error_kind(err)])
            .inc();
    }
}

fn error_kind(err: &ProviderError) -> &'static str {
    match err {
        ProviderError::RateLimit => "rate_limit",
        ProviderError::AuthError => "auth_error",
        ProviderError::Timeout => "timeout",
        ProviderError::TransientNetwork(_) => "transient_network",
        ProviderError::BadRequest(_) => "bad_request",
        ProviderError::ContentFilter => "content_filter",
        ProviderError::ServerError(_) => "server_error",
        ProviderError::Unknown(_) => "unknown",
    }
}

/// Every provider in `fallback_order` failed; the last error is surfaced
/// so the caller can classify it for the HTTP response.
#[derive(Debug, Clone, thiserror::Error)]
#[error("all providers exhausted, last error from {last_provider}: {last_error}")]
pub struct GatewayExhausted {
    pub last_provider: String,
    pub last_error: ProviderError,
}

/// Ordered fallback across a fixed provider list (spec §4.2). Providers
/// are tried in `fallback_order`; a recoverable error advances to the
/// next, a terminal error (`bad_request`, `content_filter`) stops
/// immediately rather than burning the remaining fallbacks on a request
/// that every provider would equally reject.
pub struct Gateway {
    providers: Vec<Arc<dyn Provider>>,
    metrics: GatewayMetrics,
}

impl Gateway {
    pub fn new(providers: Vec<Arc<dyn Provider>>) -> Self {
        Self {
            providers,
            metrics: GatewayMetrics::new(),
        }
    }

    pub fn provider_ids(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.id().to_string()).collect()
    }

    /// Read-only snapshot of this Gateway's metric families, for `/metrics`.
    pub fn metrics_snapshot(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.metrics.snapshot()
    }

    pub async fn call(
        &self,
        messages: &[ChatMessage],
        params: &CallParams,
    ) -> Result<CompletionResult, GatewayExhausted> {
        let mut last: Option<(String, ProviderError)> = None;
        for provider in &self.providers {
            let started = Instant::now();
            match provider.call(messages, params).await {
                Ok(result) => {
                    self.metrics
                        .record_success(provider.id(), started.elapsed().as_secs_f64());
                    return Ok(result);
                }
                Err(err) => {
                    self.metrics.record_error(provider.id(), &err);
                    let recoverable = err.is_recoverable();
                    let provider_id = provider.id().to_string();
                    last = Some((provider_id, err));
                    if !recoverable {
                        break;
                    }
                }
            }
        }
        let (last_provider, last_error) = last.unwrap_or((
            "none".to_string(),
            ProviderError::Unknown("no providers configured".to_string()),
        ));
        Err(GatewayExhausted {
            last_provider,
            last_error,
        })
    }

    pub async fn stream(
        &self,
        messages: &[ChatMessage],
        params: &CallParams,
    ) -> Result<(String, ChunkStream), GatewayExhausted> {
        let mut last: Option<(String, ProviderError)> = None;
        for provider in &self.providers {
            match provider.stream(messages, params).await {
                Ok(stream) => {
                    self.metrics.record_success(provider.id(), 0.0);
                    return Ok((provider.id().to_string(), stream));
                }
                Err(err) => {
                    self.metrics.record_error(provider.id(), &err);
                    let recoverable = err.is_recoverable();
                    let provider_id = provider.id().to_string();
                    last = Some((provider_id, err));
                    if !recoverable {
                        break;
                    }
                }
            }
        }
        let (last_provider, last_error) = last.unwrap_or((
            "none".to_string(),
            ProviderError::Unknown("no providers configured".to_string()),
        ));
        Err(GatewayExhausted {
            last_provider,
            last_error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockProvider;

    #[tokio::test]
    async fn falls_back_on_recoverable_error() {
        let p1 = Arc::new(MockProvider::always_err("p1", ProviderError::RateLimit));
        let p2 = Arc::new(MockProvider::always_ok("p2", "answer"));
        let gw = Gateway::new(vec![p1, p2]);
        let result = gw.call(&[], &CallParams::default()).await.unwrap();
        assert_eq!(result.provider_id, "p2");
    }

    #[tokio::test]
    async fn stops_on_terminal_error() {
        let p1 = Arc::new(MockProvider::always_err("p1", ProviderError::ContentFilter));
        let p2 = Arc::new(MockProvider::always_ok("p2", "answer"));
        let gw = Gateway::new(vec![p1, p2]);
        let err = gw.call(&[], &CallParams::default()).await.unwrap_err();
        assert_eq!(err.last_provider, "p1");
    }

    #[tokio::test]
    async fn exhausted_when_all_fail() {
        let p1 = Arc::new(MockProvider::always_err("p1", ProviderError::Timeout));
        let p2 = Arc::new(MockProvider::always_err("p2", ProviderError::Timeout));
        let gw = Gateway::new(vec![p1, p2]);
        let err = gw.call(&[], &CallParams::default()).await.unwrap_err();
        assert_eq!(err.last_provider, "p2");
    }
}
