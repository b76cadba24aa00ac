//! `/api/chats[...]` + `/api/chats/clear` (spec §6): a thin HTTP face on
//! [`crate::store::ChatStore`]. No auth layer — chat persistence doesn't
//! consume LLM/fetch resources (spec §6 "Authentication" scopes the
//! `X-API-Key` requirement to endpoints that do).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::errors::AppError;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    pub session_id: String,
    #[serde(default)]
    pub title: Option<String>,
}

pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateChatRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = state
        .chat_store
        .create_chat(&req.session_id, req.title.as_deref())?;
    Ok(Json(json!({ "success": true, "chat_id": id })))
}

pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SessionQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    let chats = state.chat_store.list_chats(&q.session_id)?;
    let items: Vec<serde_json::Value> = chats
        .into_iter()
        .map(|(id, title)| json!({ "id": id, "title": title }))
        .collect();
    Ok(Json(json!({ "chats": items })))
}

pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = state.chat_store.delete_chat(id)?;
    Ok(Json(json!({ "success": deleted })))
}

#[derive(Debug, Deserialize)]
pub struct AppendMessageRequest {
    pub role: String,
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

pub async fn append_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<AppendMessageRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let message_id = state
        .chat_store
        .append_message(id, &req.role, &req.text, req.metadata)?;
    Ok(Json(json!({ "success": true, "message_id": message_id })))
}

pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let messages = state.chat_store.messages(id)?;
    Ok(Json(json!({ "messages": messages })))
}

#[derive(Debug, Deserialize)]
pub struct ClearSessionRequest {
    pub session_id: String,
}

/// `POST /api/chats/clear`: delete all chats for a session.
pub async fn clear_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ClearSessionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = state.chat_store.clear_session(&req.session_id)?;
    Ok(Json(json!({ "success": true, "deleted": deleted })))
}
