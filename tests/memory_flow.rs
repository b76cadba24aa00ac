//! `/memory/role/history` and `/memory/consistency/check` against a
//! Memory Manager seeded directly via `persist_turn`, bypassing the full
//! debate flow (these endpoints are meant to be queried independently of
//! an in-flight debate).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;
use uuid::Uuid;

use symposium::blob::UnavailableBlobService;
use symposium::config::Config;
use symposium::evidence::gatherer::StaticSearchBackend;
use symposium::evidence::{EvidenceGatherer, Summarizer, UrlCache, WebFetcher};
use symposium::gateway::Gateway;
use symposium::memory::{MemoryManager, VectorStore};
use symposium::models::memory::MemoryType;
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
        cache_path: "/tmp/symposium-test-cache-2.json".to_string(),
        top_k: 5,
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

async fn build_test_state_with_memory() -> (Arc<AppState>, Arc<MemoryManager>) {
    let config = test_config();
    let gateway = Arc::new(Gateway::new(vec![Arc::new(MockProvider::always_ok(
        "primary", "unused",
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

    let state = Arc::new(AppState {
        config,
        gateway,
        memory: memory.clone(),
        gatherer,
        chat_store,
        blob_service: Arc::new(UnavailableBlobService),
        orchestrator,
    });
    (state, memory)
}

#[tokio::test]
async fn role_history_returns_seeded_statements() {
    let (state, memory) = build_test_state_with_memory().await;
    memory
        .persist_turn(
            "Vaccines are proven safe by decades of trial data.".to_string(),
            MemoryType::RoleStatement,
            Some("proponent".to_string()),
            Uuid::now_v7(),
        )
        .await
        .unwrap();

    let app = build_router(state);
    let req = Request::builder()
        .method("POST")
        .uri("/memory/role/history")
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(r#"{"role":"proponent","limit":10}"#))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["count"], 1);
    assert!(json["memories"][0]["text"]
        .as_str()
        .unwrap()
        .contains("Vaccines"));
}

#[tokio::test]
async fn consistency_check_flags_contradicting_prior_statement() {
    let (state, memory) = build_test_state_with_memory().await;
    memory
        .persist_turn(
            "The policy is not effective at reducing emissions.".to_string(),
            MemoryType::RoleStatement,
            Some("opponent".to_string()),
            Uuid::now_v7(),
        )
        .await
        .unwrap();

    let app = build_router(state);
    let req = Request::builder()
        .method("POST")
        .uri("/memory/consistency/check")
        .header("content-type", "application/json")
        .header("x-api-key", API_KEY)
        .body(Body::from(
            r#"{"role":"opponent","statement":"The policy is effective at reducing emissions.","top_k":5}"#,
        ))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["has_inconsistencies"], true);
    assert!(json["consistency_score"].as_f64().unwrap() < 1.0);
}
