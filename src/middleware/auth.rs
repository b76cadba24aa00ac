//! `X-API-Key` check for POST endpoints that consume LLM/fetch resources
//! (spec §6 "Authentication"). Grounded in the teacher's `api::mod::admin_auth`
//! — constant-time comparison via `sha2` + `subtle` so key length/contents
//! never leak through response timing.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::transport::AppState;

fn ct_eq(a: &str, b: &str) -> bool {
    let hash_a = Sha256::digest(a.as_bytes());
    let hash_b = Sha256::digest(b.as_bytes());
    hash_a.ct_eq(&hash_b).into()
}

pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok());

    match provided {
        Some(key) if ct_eq(key, &state.config.app_api_key) => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ct_eq_matches_identical_strings() {
        assert!(ct_eq("secret", "secret"));
    }

    #[test]
    fn ct_eq_rejects_different_strings() {
        assert!(!ct_eq("secret", "other"));
    }
}
