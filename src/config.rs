use serde::Deserialize;

/// Environment configuration, enumerated in spec §6. Loaded once at process
/// start via `dotenvy` + `std::env::var`, the same pattern as the teacher's
/// `config::load`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    pub provider_order: Vec<String>,
    pub primary_credentials: Vec<String>,
    pub secondary_credentials: Vec<String>,
    pub embedding_dim: usize,
    pub vector_db_path: String,
    pub cache_ttl_seconds: u64,
    pub cache_path: String,
    pub top_k: usize,
    pub fetch_timeout_ms: u64,
    pub provider_first_token_ms: u64,
    pub debate_total_ms: u64,
    pub role_prompts_path: Option<String>,
    pub app_api_key: String,
    pub max_io_workers: usize,
    /// Not individually enumerated in spec.md §6's variable list (which
    /// only names `PROVIDER_ORDER`/`*_CREDENTIALS`) — needed to build a
    /// concrete `ProviderProfile` per provider id. Defaults to an
    /// OpenAI-compatible endpoint so the crate boots with just a key set.
    pub primary_base_url: String,
    pub primary_model: String,
    pub secondary_base_url: String,
    pub secondary_model: String,
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let app_api_key =
        std::env::var("APP_API_KEY").unwrap_or_else(|_| "CHANGE_ME_DEV_ONLY_KEY".into());

    if app_api_key == "CHANGE_ME_DEV_ONLY_KEY" {
        let env_mode = std::env::var("APP_ENV").unwrap_or_default();
        if env_mode == "production" {
            anyhow::bail!(
                "APP_API_KEY is still the insecure placeholder. \
                 Set a real key before running with APP_ENV=production."
            );
        }
        eprintln!("⚠️  APP_API_KEY is not set — using insecure development placeholder.");
    }

    Ok(Config {
        port: env_parse("PORT", 8080),
        provider_order: env_list("PROVIDER_ORDER", &["primary", "secondary"]),
        primary_credentials: env_list("PRIMARY_CREDENTIALS", &[]),
        secondary_credentials: env_list("SECONDARY_CREDENTIALS", &[]),
        embedding_dim: env_parse("EMBEDDING_DIM", 384),
        vector_db_path: std::env::var("VECTOR_DB_PATH")
            .unwrap_or_else(|_| "./data/vectors.sqlite3".into()),
        cache_ttl_seconds: env_parse("CACHE_TTL_SECONDS", 24 * 3600),
        cache_path: std::env::var("CACHE_PATH").unwrap_or_else(|_| "./data/url_cache.json".into()),
        top_k: env_parse("TOP_K", 5),
        fetch_timeout_ms: env_parse("FETCH_TIMEOUT_MS", 10_000),
        provider_first_token_ms: env_parse("PROVIDER_FIRST_TOKEN_MS", 20_000),
        debate_total_ms: env_parse("DEBATE_TOTAL_MS", 5 * 60 * 1000),
        role_prompts_path: std::env::var("ROLE_PROMPTS_PATH").ok(),
        app_api_key,
        max_io_workers: env_parse("MAX_IO_WORKERS", 16),
        primary_base_url: std::env::var("PRIMARY_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string()),
        primary_model: std::env::var("PRIMARY_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
        secondary_base_url: std::env::var("SECONDARY_BASE_URL")
            .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string()),
        secondary_model: std::env::var("SECONDARY_MODEL")
            .unwrap_or_else(|_| "claude-3-5-haiku".to_string()),
    })
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_list(key: &str, default: &[&str]) -> Vec<String> {
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => default.iter().map(|s| s.to_string()).collect(),
    }
}
