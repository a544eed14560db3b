use std::rc::Rc;

use chrono::{DateTime, NaiveDateTime};
use serde::Serialize;
use serde_json::Value;

use super::{
    client::{ApiRequest, ApiResponse, Transport},
    types::{ApiError, AuthResponse, Credentials, RefreshRequest},
};
use crate::state::session::{Session, SessionStore};

/// Login, registration and token refresh against the auth endpoints. Talks
/// to the raw transport: these calls carry their own credentials and must
/// not re-enter the refresh check.
#[derive(Clone)]
pub struct AuthApi {
    transport: Rc<dyn Transport>,
    store: SessionStore,
}

impl AuthApi {
    pub fn new(transport: Rc<dyn Transport>, store: SessionStore) -> Self {
        Self { transport, store }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn is_authenticated(&self) -> bool {
        self.store.is_authenticated()
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Option<Session>, ApiError> {
        let body = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.authenticate("/login", &body, "Login").await
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Option<Session>, ApiError> {
        let body = Credentials {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.authenticate("/register", &body, "Register").await
    }

    /// Exchanges the refresh token for a new session. Without a refresh token
    /// nothing is sent. On failure the stale session stays in place.
    pub async fn refresh(&self) -> Result<Option<Session>, ApiError> {
        let Some(refresh_token) = self.store.refresh_token() else {
            return Ok(None);
        };
        self.authenticate("/refresh", &RefreshRequest { refresh_token }, "Refresh")
            .await
    }

    pub fn logout(&self) -> Result<(), ApiError> {
        self.store.clear()?;
        log::info!("Session cleared");
        Ok(())
    }

    async fn authenticate<T: Serialize>(
        &self,
        path: &str,
        body: &T,
        action: &str,
    ) -> Result<Option<Session>, ApiError> {
        let request = ApiRequest::post(path).json(body)?;
        let response = self
            .transport
            .send(request)
            .await
            .and_then(ApiResponse::error_for_status)
            .map_err(|err| {
                log::error!("{} error: {} ({})", action, err, err.code);
                err
            })?;

        let Some(session) = decode_auth_payload(&response.body) else {
            log::warn!("{} response carried no usable session", action);
            return Ok(None);
        };
        if let Err(err) = self.store.replace(session.clone()) {
            log::warn!("{} succeeded but the session was not persisted: {}", action, err);
        }
        Ok(Some(session))
    }
}

/// Normalizes an auth payload into a [`Session`]. The body may be the JSON
/// object itself or a JSON string wrapping it. Returns `None` for empty or
/// `null` bodies, missing or blank fields, and unreadable expiry timestamps.
pub fn decode_auth_payload(body: &[u8]) -> Option<Session> {
    let mut value: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(err) => {
            if !body.is_empty() {
                log::warn!("Auth payload is not JSON: {}", err);
            }
            return None;
        }
    };
    if let Value::String(inner) = &value {
        value = match serde_json::from_str(inner) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("Auth payload string is not JSON: {}", err);
                return None;
            }
        };
    }
    if value.is_null() {
        return None;
    }

    let payload: AuthResponse = match serde_json::from_value(value) {
        Ok(payload) => payload,
        Err(err) => {
            log::warn!("Auth payload is missing fields: {}", err);
            return None;
        }
    };
    let fields = [
        &payload.access_token,
        &payload.refresh_token,
        &payload.user_id,
    ];
    if fields.iter().any(|field| field.trim().is_empty()) {
        log::warn!("Auth payload has blank credentials");
        return None;
    }
    let Some(expires_at) = parse_expiry(&payload.expires_at) else {
        log::warn!("Auth payload has unreadable expires_at: {}", payload.expires_at);
        return None;
    };

    Some(Session {
        access_token: Some(payload.access_token),
        refresh_token: Some(payload.refresh_token),
        user_id: Some(payload.user_id),
        expires_at: Some(expires_at),
    })
}

/// RFC 3339 first; a bare `YYYY-MM-DDTHH:MM:SS[.fff]` is read as UTC.
fn parse_expiry(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp_millis());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}
