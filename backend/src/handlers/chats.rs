use axum::{
    extract::{Path, RawQuery, State},
    Json,
};
use serde_json::Value;

use crate::{
    error::AppError,
    services::upstream::{ForwardHeaders, Upstream, UpstreamRequest},
    state::AppState,
};

pub async fn interpret(
    State(state): State<AppState>,
    headers: ForwardHeaders,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let request = UpstreamRequest::post(Upstream::Ai, "/ai/interpret").json(payload);
    Ok(Json(state.upstream.json(request, &headers).await?))
}

pub async fn create_chat(
    State(state): State<AppState>,
    headers: ForwardHeaders,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let request = UpstreamRequest::post(Upstream::Ai, "/chats").json(payload);
    Ok(Json(state.upstream.json(request, &headers).await?))
}

pub async fn list_chats(
    State(state): State<AppState>,
    headers: ForwardHeaders,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let request = UpstreamRequest::get(Upstream::Ai, "/chats").query(query);
    Ok(Json(state.upstream.json(request, &headers).await?))
}

pub async fn rename_chat(
    State(state): State<AppState>,
    headers: ForwardHeaders,
    Path(chat_id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let chat_id = require_chat_id(&chat_id)?;
    let request = UpstreamRequest::patch(Upstream::Ai, format!("/chats/{}", chat_id)).json(payload);
    Ok(Json(state.upstream.json(request, &headers).await?))
}

pub async fn get_messages(
    State(state): State<AppState>,
    headers: ForwardHeaders,
    Path(chat_id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let chat_id = require_chat_id(&chat_id)?;
    let request =
        UpstreamRequest::get(Upstream::Ai, format!("/chats/{}/messages", chat_id)).query(query);
    Ok(Json(state.upstream.json(request, &headers).await?))
}

fn require_chat_id(raw: &str) -> Result<&str, AppError> {
    let chat_id = raw.trim();
    if chat_id.is_empty() {
        return Err(AppError::BadRequest(
            "Parameter 'chat_id' is required".to_string(),
        ));
    }
    Ok(chat_id)
}
