use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    error::AppError,
    services::upstream::{ForwardHeaders, Upstream, UpstreamRequest},
    state::AppState,
};

/// Token payload as the auth service may spell it.
#[derive(Debug, Deserialize)]
struct UpstreamTokens {
    #[serde(alias = "AccessToken", alias = "accessToken")]
    access_token: Option<String>,
    #[serde(alias = "RefreshToken", alias = "refreshToken")]
    refresh_token: Option<String>,
    #[serde(alias = "ExpiresAt", alias = "expiresAt")]
    expires_at: Option<String>,
    #[serde(alias = "UserID", alias = "UserId", alias = "userId")]
    user_id: Option<Value>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: String,
    pub user_id: String,
}

pub async fn login(
    State(state): State<AppState>,
    headers: ForwardHeaders,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    forward(&state, "/auth/login", &headers, payload).await
}

pub async fn register(
    State(state): State<AppState>,
    headers: ForwardHeaders,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    forward(&state, "/auth/register", &headers, payload).await
}

pub async fn refresh(
    State(state): State<AppState>,
    headers: ForwardHeaders,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, AppError> {
    forward(&state, "/auth/refresh", &headers, refresh_body(payload)).await
}

/// The auth service reads `RefreshToken`; the browser sends `refresh_token`.
/// Both keys go upstream.
pub fn refresh_body(mut payload: Value) -> Value {
    if let Some(body) = payload.as_object_mut() {
        let token = body
            .get("refresh_token")
            .or_else(|| body.get("RefreshToken"))
            .cloned();
        if let Some(token) = token {
            body.insert("RefreshToken".to_string(), token.clone());
            body.insert("refresh_token".to_string(), token);
        }
    }
    payload
}

async fn forward(
    state: &AppState,
    path: &str,
    headers: &ForwardHeaders,
    payload: Value,
) -> Result<Json<Value>, AppError> {
    let value = state
        .upstream
        .json(UpstreamRequest::post(Upstream::Auth, path).json(payload), headers)
        .await?;
    Ok(Json(normalize_tokens(value)))
}

/// Rewrites a token payload into snake_case. Anything that does not look like
/// a complete payload is passed through untouched for the client to reject.
pub fn normalize_tokens(value: Value) -> Value {
    let candidate = match &value {
        Value::String(inner) => match serde_json::from_str::<Value>(inner) {
            Ok(parsed) => parsed,
            Err(_) => return value,
        },
        _ => value.clone(),
    };
    if !candidate.is_object() {
        return value;
    }

    let Ok(tokens) = serde_json::from_value::<UpstreamTokens>(candidate) else {
        return value;
    };
    let user_id = match tokens.user_id {
        Some(Value::String(id)) => Some(id),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    };
    match (
        tokens.access_token,
        tokens.refresh_token,
        tokens.expires_at,
        user_id,
    ) {
        (Some(access_token), Some(refresh_token), Some(expires_at), Some(user_id)) => {
            serde_json::to_value(TokenResponse {
                access_token,
                refresh_token,
                expires_at,
                user_id,
            })
            .unwrap_or(value)
        }
        _ => {
            tracing::warn!("Auth service returned an incomplete token payload");
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pascal_case_payload_is_normalized() {
        let value = normalize_tokens(json!({
            "AccessToken": "A1",
            "RefreshToken": "R1",
            "ExpiresAt": "2026-01-01T00:00:00Z",
            "UserID": "U1"
        }));
        assert_eq!(
            value,
            json!({
                "access_token": "A1",
                "refresh_token": "R1",
                "expires_at": "2026-01-01T00:00:00Z",
                "user_id": "U1"
            })
        );
    }

    #[test]
    fn string_wrapped_payload_and_numeric_user_id() {
        let inner = json!({
            "access_token": "A1",
            "refresh_token": "R1",
            "expires_at": "2026-01-01T00:00:00Z",
            "user_id": 42
        });
        let value = normalize_tokens(Value::String(inner.to_string()));
        assert_eq!(value["user_id"], "42");
        assert_eq!(value["access_token"], "A1");
    }

    #[test]
    fn refresh_body_carries_both_spellings() {
        let body = refresh_body(json!({ "refresh_token": "R1" }));
        assert_eq!(body, json!({ "refresh_token": "R1", "RefreshToken": "R1" }));

        let body = refresh_body(json!({ "RefreshToken": "R2" }));
        assert_eq!(body["refresh_token"], "R2");
        assert_eq!(refresh_body(json!({})), json!({}));
    }

    #[test]
    fn incomplete_payload_passes_through() {
        let original = json!({ "AccessToken": "A1" });
        assert_eq!(normalize_tokens(original.clone()), original);
        assert_eq!(normalize_tokens(Value::Null), Value::Null);
        assert_eq!(
            normalize_tokens(Value::String("not json".into())),
            Value::String("not json".into())
        );
    }
}
