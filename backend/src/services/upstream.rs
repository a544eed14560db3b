use std::{convert::Infallible, time::Duration};

use axum::{
    body::Bytes,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, HeaderValue, Method, StatusCode},
};
use reqwest::{multipart::Form, Client};
use serde_json::Value;

use crate::{config::Config, error::AppError, middleware::request_id::REQUEST_ID_HEADER};

/// The two services the proxy fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Auth,
    Ai,
}

impl Upstream {
    pub fn name(self) -> &'static str {
        match self {
            Upstream::Auth => "auth",
            Upstream::Ai => "ai",
        }
    }
}

/// Caller headers that travel with every upstream call.
#[derive(Debug, Clone, Default)]
pub struct ForwardHeaders {
    pub authorization: Option<HeaderValue>,
    pub request_id: Option<HeaderValue>,
}

impl ForwardHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            authorization: headers.get(AUTHORIZATION).cloned(),
            request_id: headers.get(REQUEST_ID_HEADER).cloned(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ForwardHeaders {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

#[derive(Debug)]
pub enum UpstreamBody {
    Empty,
    Json(Value),
    Multipart(Form),
}

#[derive(Debug)]
pub struct UpstreamRequest {
    pub upstream: Upstream,
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub body: UpstreamBody,
}

impl UpstreamRequest {
    pub fn new(upstream: Upstream, method: Method, path: impl Into<String>) -> Self {
        Self {
            upstream,
            method,
            path: path.into(),
            query: None,
            body: UpstreamBody::Empty,
        }
    }

    pub fn get(upstream: Upstream, path: impl Into<String>) -> Self {
        Self::new(upstream, Method::GET, path)
    }

    pub fn post(upstream: Upstream, path: impl Into<String>) -> Self {
        Self::new(upstream, Method::POST, path)
    }

    pub fn patch(upstream: Upstream, path: impl Into<String>) -> Self {
        Self::new(upstream, Method::PATCH, path)
    }

    /// Raw query string as received, without the leading `?`.
    pub fn query(mut self, query: Option<String>) -> Self {
        self.query = query.filter(|q| !q.is_empty());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = UpstreamBody::Json(body);
        self
    }

    pub fn multipart(mut self, form: Form) -> Self {
        self.body = UpstreamBody::Multipart(form);
        self
    }
}

#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
    auth_base_url: String,
    ai_base_url: String,
}

impl UpstreamClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("sonnik-backend/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.upstream_timeout_seconds))
            .build()?;
        Ok(Self {
            http,
            auth_base_url: config.auth_base_url.clone(),
            ai_base_url: config.ai_base_url.clone(),
        })
    }

    pub fn url(&self, upstream: Upstream, path: &str, query: Option<&str>) -> String {
        let base = match upstream {
            Upstream::Auth => &self.auth_base_url,
            Upstream::Ai => &self.ai_base_url,
        };
        match query {
            Some(query) => format!("{}{}?{}", base, path, query),
            None => format!("{}{}", base, path),
        }
    }

    /// Sends the request and returns the raw success body. Non-2xx answers
    /// and transport failures become `AppError`s.
    pub async fn send(
        &self,
        request: UpstreamRequest,
        headers: &ForwardHeaders,
    ) -> Result<Bytes, AppError> {
        let UpstreamRequest {
            upstream,
            method,
            path,
            query,
            body,
        } = request;
        let url = self.url(upstream, &path, query.as_deref());
        tracing::debug!(upstream = upstream.name(), %method, %url, "Forwarding request");

        let mut builder = self.http.request(method, &url);
        if let Some(value) = &headers.authorization {
            builder = builder.header(AUTHORIZATION, value.clone());
        }
        if let Some(value) = &headers.request_id {
            builder = builder.header(REQUEST_ID_HEADER, value.clone());
        }
        builder = match body {
            UpstreamBody::Empty => builder,
            UpstreamBody::Json(value) => builder.json(&value),
            UpstreamBody::Multipart(form) => builder.multipart(form),
        };

        let response = builder.send().await.map_err(|e: reqwest::Error| {
            AppError::InternalServerError(anyhow::anyhow!(
                "Failed to reach {} service at {}: {}",
                upstream.name(),
                path,
                e
            ))
        })?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(|e: reqwest::Error| {
            AppError::InternalServerError(anyhow::anyhow!(
                "Failed to read {} service response: {}",
                upstream.name(),
                e
            ))
        })?;

        if !status.is_success() {
            tracing::warn!(
                upstream = upstream.name(),
                path = %path,
                status = status.as_u16(),
                "Upstream returned an error status"
            );
            return Err(map_upstream_error(upstream, status, &bytes));
        }
        Ok(bytes)
    }

    /// Like `send`, decoding the body as JSON. An empty body reads as `null`.
    pub async fn json(
        &self,
        request: UpstreamRequest,
        headers: &ForwardHeaders,
    ) -> Result<Value, AppError> {
        let upstream = request.upstream;
        let bytes = self.send(request, headers).await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::InternalServerError(anyhow::anyhow!(
                "Invalid JSON from {} service: {}",
                upstream.name(),
                e
            ))
        })
    }
}

/// Forwards the upstream status and message when the body carries one,
/// otherwise hides the failure behind a generic internal error.
pub fn map_upstream_error(upstream: Upstream, status: StatusCode, body: &[u8]) -> AppError {
    let parsed: Option<Value> = serde_json::from_slice(body).ok();
    let message = parsed.as_ref().and_then(|value| {
        ["message", "error"]
            .iter()
            .filter_map(|key| value.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|text| !text.is_empty())
            .map(str::to_string)
    });

    match message {
        Some(message) if status.is_client_error() || status.is_server_error() => {
            AppError::Upstream {
                status,
                message,
                details: parsed.and_then(|value| value.get("details").cloned()),
            }
        }
        _ => AppError::InternalServerError(anyhow::anyhow!(
            "{} service returned {}",
            upstream.name(),
            status
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    fn client() -> UpstreamClient {
        let config = Config {
            auth_base_url: "http://auth.local".into(),
            ai_base_url: "http://ai.local".into(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            upstream_timeout_seconds: 5,
            max_upload_bytes: 1024,
            cors_allow_origins: vec!["*".into()],
        };
        UpstreamClient::new(&config).unwrap()
    }

    #[test]
    fn url_joins_base_path_and_query() {
        let client = client();
        assert_eq!(
            client.url(Upstream::Auth, "/auth/login", None),
            "http://auth.local/auth/login"
        );
        assert_eq!(
            client.url(Upstream::Ai, "/chats", Some("user_id=U1")),
            "http://ai.local/chats?user_id=U1"
        );
    }

    #[test]
    fn empty_query_is_dropped() {
        let request = UpstreamRequest::get(Upstream::Ai, "/folders").query(Some(String::new()));
        assert!(request.query.is_none());
    }

    #[test]
    fn structured_error_is_forwarded() {
        let err = map_upstream_error(
            Upstream::Ai,
            StatusCode::UNPROCESSABLE_ENTITY,
            br#"{"message":"voice not found"}"#,
        );
        match err {
            AppError::Upstream {
                status, message, ..
            } => {
                assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
                assert_eq!(message, "voice not found");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn error_field_is_used_when_message_is_absent() {
        let err = map_upstream_error(
            Upstream::Auth,
            StatusCode::UNAUTHORIZED,
            br#"{"error":"invalid credentials"}"#,
        );
        assert!(matches!(
            err,
            AppError::Upstream { ref message, .. } if message == "invalid credentials"
        ));
    }

    #[test]
    fn unstructured_error_becomes_internal() {
        let err = map_upstream_error(Upstream::Ai, StatusCode::BAD_GATEWAY, b"<html>oops</html>");
        assert!(matches!(err, AppError::InternalServerError(_)));
        assert_eq!(
            err.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
