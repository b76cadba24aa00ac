//! End-to-end router tests: auth gating, chat CRUD, a full analyze_topic
//! round trip, and debate cancellation — exercised against the real
//! `build_router` with in-memory/tempdir-backed components and a
//! `MockProvider` gateway, the same style the teacher's (now-deleted)
//! `tests/integration.rs` used against its own `AppState`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use symposium::blob::UnavailableBlobService;
use symposium::config::Config;
use symposium::evidence::gatherer::StaticSearchBackend;
use symposium::evidence::{EvidenceGatherer, Summarizer, UrlCache, WebFetcher};
use symposium::gateway::Gateway;
use symposium::memory::{MemoryManager, VectorStore};
use symposium::orchestrator::roles::RolePrompts;
use symposium::orchestrator::Orchestrator;
use symposium::provider::MockProvider;
use symposium::store::ChatStore;
use symposium::transport::{build_router, AppState};

const API_KEY: &str = "test-key-123";

fn test_config() -> Config {
    Config {
        port: 0,
        provider_order: vec!["primary".to_string()],
        primary_credentials: vec!["k".to_string()],
        secondary_credentials: vec![],
        embedding_dim: 32,
        vector_db_path: ":memory:".to_string(),
        cache_ttl_seconds: 3600,
        cache_path: "/tmp/symposium-test-cache.json".to_string(),
        top_k: 3,
        fetch_timeout_ms: 5_000,
        provider_first_token_ms: 20_000,
        debate_total_ms: 60_000,
        role_prompts_path: None,
        app_api_key: API_KEY.to_string(),
        max_io_workers: 4,
        primary_base_url: "https://example.invalid/v1/chat/completions".to_string(),
        primary_model: "test-model".to_string(),
        secondary_base_url: "https://example.invalid/v1/messages".to_string(),
        secondary_model: "test-model-2".to_string(),
    }
}

fn build_test_state(reply: &str) -> Arc<AppState> {
    let config = test_config();
    let gateway = Arc::new(Gateway::new(vec![Arc::new(MockProvider::always_ok(
        "primary",
        reply,
    ))]));
    let vector_store = Arc::new(VectorStore::in_memory(config.embedding_dim).unwrap());
    let dir = tempfile::tempdir().unwrap();
    let url_cache = Arc::new(UrlCache::load(dir.path().join("cache.json"), config.cache_ttl_seconds));
    let fetcher = Arc::new(WebFetcher::new(config.fetch_timeout_ms, 1_000_000));
    let summarizer = Arc::new(Summarizer::new(gateway.clone()));
    let search = Arc::new(StaticSearchBackend::new(Vec::new()));
    let gatherer = Arc::new(EvidenceGatherer::new(
        search,
        fetcher.clone(),
        url_cache.clone(),
        summarizer.clone(),
        config.max_io_workers,
    ));
    let embed = symposium::embedding::hashing_embed_fn(config.embedding_dim);
    let memory = Arc::new(MemoryManager::new(
        vector_store,
        config.top_k,
        url_cache,
        fetcher,
        summarizer,
        embed,
    ));
    let role_prompts = Arc::new(RolePrompts::load(None).unwrap());
    let orchestrator = Arc::new(Orchestrator::new(
        gateway.clone(),
        memory.clone(),
        gatherer.clone(),
        role_prompts,
    ));
    let chat_store = Arc::new(ChatStore::in_memory().unwrap());

    Arc::new(AppState {
        config,
        gateway,
        memory,
        gatherer,
        chat_store,
        blob_service: Arc::new(UnavailableBlobService),
        orchestrator,
    })
}

#[tokio::test]
async fn protected_endpoint_rejects_missing_api_key() {
    let app = build_router(build_test_state("hello"));
    let req = Request::builder()
        .method("POST")
        .uri("/analyze_topic")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"topic":"is water wet"}"#))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_endpoint_accepts_valid_api_key() {
    let app = build_router(build_test_state("water is wet because of cohesion"));
    let req = Request::builder()
        .method("POST")
        .uri("/analyze_topic")
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(r#"{"topic":"is water wet"}"#))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], true);
    assert!(json["analysis"].as_str().unwrap().contains("cohesion"));
}

#[tokio::test]
async fn healthz_and_readyz_are_unauthenticated() {
    let app = build_router(build_test_state("unused"));
    let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let req = Request::builder().uri("/readyz").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn chat_crud_round_trips_without_auth() {
    let app = build_router(build_test_state("unused"));

    let create_req = Request::builder()
        .method("POST")
        .uri("/api/chats/")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"session_id":"s1","title":"My chat"}"#))
        .unwrap();
    let resp = app.clone().oneshot(create_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let chat_id = json["chat_id"].as_str().unwrap().to_string();

    let append_req = Request::builder()
        .method("POST")
        .uri(format!("/api/chats/{chat_id}/messages"))
        .header("content-type", "application/json")
        .body(Body::from(r#"{"role":"user","text":"hi there"}"#))
        .unwrap();
    let resp = app.clone().oneshot(append_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let list_req = Request::builder()
        .uri(format!("/api/chats/{chat_id}/messages"))
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(list_req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["messages"][0]["text"], "hi there");
}

#[tokio::test]
async fn rag_debate_non_streaming_returns_trace_and_verdict() {
    let verdict_json = r#"{"verdict":"VERIFIED","confidence_pct":80,"summary":"looks solid"}"#;
    let app = build_router(build_test_state(verdict_json));
    let req = Request::builder()
        .method("POST")
        .uri("/rag/debate")
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(
            r#"{"topic":"is the earth round","stream":false,"enable_web_rag":false}"#,
        ))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["trace"].as_array().unwrap().len() > 0);
    assert_eq!(json["verdict"]["verdict"], "VERIFIED");
}

#[tokio::test]
async fn analyze_topic_meta_reports_internal_knowledge_without_web_rag() {
    let app = build_router(build_test_state("water is wet because of cohesion"));
    let req = Request::builder()
        .method("POST")
        .uri("/analyze_topic")
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(r#"{"topic":"is water wet","enable_web_rag":false}"#))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["meta"]["rag_status"], "INTERNAL_KNOWLEDGE");
    assert!(json["meta"]["latency"].as_f64().unwrap() >= 0.0);
    assert!(json["meta"]["latency_ms"].is_u64());
}

#[tokio::test]
async fn text_action_summarizes_via_gateway() {
    let app = build_router(build_test_state("a concise summary"));
    let req = Request::builder()
        .method("POST")
        .uri("/text_action")
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(r#"{"text":"a long passage","action":"summarize"}"#))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["result"], "a concise summary");
}

#[tokio::test]
async fn ocr_upload_reports_unavailable_blob_service() {
    let app = build_router(build_test_state("unused"));
    let boundary = "X-TEST-BOUNDARY";
    let body_str = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"a.png\"\r\nContent-Type: image/png\r\n\r\nfakebytes\r\n--{boundary}--\r\n"
    );
    let req = Request::builder()
        .method("POST")
        .uri("/ocr_upload")
        .header("x-api-key", API_KEY)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body_str))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}
