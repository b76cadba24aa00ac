mod blob;
mod config;
mod embedding;
mod errors;
mod evidence;
mod gateway;
mod memory;
mod middleware;
mod models;
mod orchestrator;
mod provider;
mod store;
mod transport;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::prelude::*;

use blob::UnavailableBlobService;
use evidence::gatherer::StaticSearchBackend;
use evidence::{EvidenceGatherer, Summarizer, UrlCache, WebFetcher};
use gateway::Gateway;
use memory::{MemoryManager, VectorStore};
use orchestrator::roles::RolePrompts;
use orchestrator::Orchestrator;
use provider::{CredentialPool, HttpProvider, Provider, ProviderProfile};
use store::ChatStore;
use transport::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "symposium=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = config::load()?;
    let port = cfg.port;

    tracing::info!("Building provider gateway...");
    let providers = build_providers(&cfg);
    let gateway = Arc::new(Gateway::new(providers));

    tracing::info!(path = %cfg.vector_db_path, "Opening vector store...");
    let vector_store = Arc::new(VectorStore::open(&cfg.vector_db_path, cfg.embedding_dim)?);

    tracing::info!(path = %cfg.cache_path, ttl_seconds = cfg.cache_ttl_seconds, "Loading URL cache...");
    let url_cache = Arc::new(UrlCache::load(cfg.cache_path.clone(), cfg.cache_ttl_seconds));

    let fetcher = Arc::new(WebFetcher::new(cfg.fetch_timeout_ms, 5 * 1024 * 1024));
    let summarizer = Arc::new(Summarizer::new(gateway.clone()));

    let search_backend = Arc::new(StaticSearchBackend::new(Vec::new()));
    let gatherer = Arc::new(EvidenceGatherer::new(
        search_backend,
        fetcher.clone(),
        url_cache.clone(),
        summarizer.clone(),
        cfg.max_io_workers,
    ));

    let embed = embedding::hashing_embed_fn(cfg.embedding_dim);
    let memory_manager = Arc::new(MemoryManager::new(
        vector_store.clone(),
        cfg.top_k,
        url_cache.clone(),
        fetcher.clone(),
        summarizer.clone(),
        embed,
    ));

    let role_prompts = Arc::new(RolePrompts::load(cfg.role_prompts_path.as_deref())?);
    let orchestrator = Arc::new(Orchestrator::new(
        gateway.clone(),
        memory_manager.clone(),
        gatherer.clone(),
        role_prompts,
    ));

    let chat_db_path = chat_store_path(&cfg);
    tracing::info!(path = %chat_db_path, "Opening chat store...");
    let chat_store = Arc::new(ChatStore::open(&chat_db_path)?);

    let state = Arc::new(AppState {
        config: cfg,
        gateway,
        memory: memory_manager,
        gatherer,
        chat_store,
        blob_service: Arc::new(UnavailableBlobService),
        orchestrator,
    });

    spawn_cache_flush_job(url_cache.clone());

    let app = transport::build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Symposium listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_providers(cfg: &config::Config) -> Vec<Arc<dyn Provider>> {
    let mut providers: Vec<Arc<dyn Provider>> = Vec::new();
    for id in &cfg.provider_order {
        let (base_url, model, credentials) = match id.as_str() {
            "primary" => (
                cfg.primary_base_url.clone(),
                cfg.primary_model.clone(),
                cfg.primary_credentials.clone(),
            ),
            "secondary" => (
                cfg.secondary_base_url.clone(),
                cfg.secondary_model.clone(),
                cfg.secondary_credentials.clone(),
            ),
            other => {
                tracing::warn!(provider = other, "unknown provider id in PROVIDER_ORDER, skipping");
                continue;
            }
        };
        if credentials.is_empty() {
            tracing::warn!(provider = %id, "no credentials configured, skipping provider");
            continue;
        }
        let profile = ProviderProfile {
            id: id.clone(),
            base_url,
            model,
            auth_header: "Authorization".to_string(),
            auth_prefix: "Bearer ".to_string(),
        };
        providers.push(Arc::new(HttpProvider::new(profile, CredentialPool::new(credentials))));
    }
    providers
}

/// The Vector Store and the chat store are two distinct `rusqlite`
/// connections (spec §6 "Persisted state") — the chat database sits
/// alongside the vector database file rather than needing its own
/// configured path.
fn chat_store_path(cfg: &config::Config) -> String {
    let mut path = std::path::PathBuf::from(&cfg.vector_db_path);
    path.set_file_name("chats.sqlite3");
    path.to_string_lossy().into_owned()
}

/// Periodically persist the URL cache's on-disk document, mirroring the
/// teacher's `jobs::cleanup::spawn` background-task pattern (spec §2
/// "[ADD] Background jobs").
fn spawn_cache_flush_job(cache: Arc<UrlCache>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            cache.flush().await;
        }
    });
    tracing::info!("Background cache-flush job started (every 5m)");
}
