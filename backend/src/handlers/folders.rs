use axum::{
    extract::{RawQuery, State},
    Json,
};
use serde_json::Value;

use crate::{
    error::AppError,
    services::upstream::{ForwardHeaders, Upstream, UpstreamRequest},
    state::AppState,
};

pub async fn create_folder(
    State(state): State<AppState>,
    headers: ForwardHeaders,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let request = UpstreamRequest::post(Upstream::Ai, "/folders").json(payload);
    Ok(Json(state.upstream.json(request, &headers).await?))
}

pub async fn list_folders(
    State(state): State<AppState>,
    headers: ForwardHeaders,
    RawQuery(query): RawQuery,
) -> Result<Json<Value>, AppError> {
    let request = UpstreamRequest::get(Upstream::Ai, "/folders").query(query);
    Ok(Json(state.upstream.json(request, &headers).await?))
}
