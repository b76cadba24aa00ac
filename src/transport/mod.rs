//! Transport / SSE Layer (C11): the only component that speaks HTTP (spec
//! §4.11, §6). `AppState` mirrors the teacher's `pub struct AppState { db,
//! vault, cache, ... }` in `src/main.rs` — one `Arc` built once at startup
//! and handed to every handler via axum's `State` extractor.

pub mod chat;
pub mod game;
pub mod handlers;
pub mod memory;
pub mod sse;

use std::sync::Arc;

use axum::http::{HeaderName, Method, StatusCode};
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::blob::BlobToText;
use crate::config::Config;
use crate::evidence::EvidenceGatherer;
use crate::gateway::Gateway;
use crate::memory::MemoryManager;
use crate::middleware::auth::require_api_key;
use crate::orchestrator::Orchestrator;
use crate::store::ChatStore;

/// Every component the handlers touch. A debate's `CancellationToken` is
/// created per-request and owned by its SSE response (see
/// `transport::sse::stream_response`) rather than tracked in a shared
/// registry — the only cancellation trigger spec.md §4.11 defines is the
/// client closing the connection.
pub struct AppState {
    pub config: Config,
    pub gateway: Arc<Gateway>,
    pub memory: Arc<MemoryManager>,
    pub gatherer: Arc<EvidenceGatherer>,
    pub chat_store: Arc<ChatStore>,
    pub blob_service: Arc<dyn BlobToText>,
    pub orchestrator: Arc<Orchestrator>,
}

/// Build the full router: unauthenticated ambient endpoints plus the
/// resource-consuming surface behind [`require_api_key`] (spec §6
/// "Authentication" — required on POSTs that consume LLM/fetch
/// resources).
pub fn build_router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/analyze_topic", post(handlers::analyze_topic))
        .route("/rag/debate", post(handlers::rag_debate))
        .route("/v2/analyze", post(handlers::v2_analyze))
        .route("/ocr_upload", post(handlers::ocr_upload))
        .route("/transcribe", post(handlers::transcribe))
        .route("/text_action", post(handlers::text_action))
        .route("/memory/role/reversal", post(memory::role_reversal))
        .route("/memory/role/history", post(memory::role_history))
        .route(
            "/memory/consistency/check",
            post(memory::consistency_check),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let chats = Router::new()
        .route("/", get(chat::list_chats).post(chat::create_chat))
        .route("/clear", post(chat::clear_session))
        .route("/:id", delete(chat::delete_chat))
        .route(
            "/:id/messages",
            get(chat::list_messages).post(chat::append_message),
        );

    let app = Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .route("/api/game/headlines", get(game::headlines))
        .nest("/api/chats", chats)
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer({
            let dashboard_origin = std::env::var("DASHBOARD_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string());
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin_str = origin.to_str().unwrap_or("");
                    origin_str == dashboard_origin
                        || origin_str.starts_with("http://localhost:")
                        || origin_str.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([Method::GET, Method::POST, Method::DELETE])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("x-api-key"),
                    HeaderName::from_static("x-request-id"),
                ])
        })
        .layer(middleware::from_fn(request_id_middleware));

    app
}

async fn readiness_check() -> &'static str {
    "ok"
}

async fn metrics_handler(
    axum::extract::State(state): axum::extract::State<Arc<AppState>>,
) -> Result<String, StatusCode> {
    use prometheus::{Encoder, TextEncoder};
    let metric_families = state.gateway.metrics_snapshot();
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn request_id_middleware(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = Uuid::new_v4().to_string();
    let mut resp = next.run(req).await;
    if let Ok(val) = axum::http::HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}
