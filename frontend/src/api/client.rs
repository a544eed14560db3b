use std::{cell::Cell, rc::Rc};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION},
    Client, Method, StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::{auth::AuthApi, types::ApiError};
use crate::config;

/// Remaining access-token lifetime below which a call refreshes first.
pub const REFRESH_THRESHOLD_MS: i64 = 60 * 1000;

#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        content_type: String,
        data: Vec<u8>,
    },
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    Multipart(Vec<FormPart>),
}

/// Transport-neutral request. `path` is relative to the API base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::unknown(format!("Failed to serialize request: {}", e)))?;
        self.body = RequestBody::Json(value);
        Ok(self)
    }

    /// Flattens a serializable struct into query pairs. `None` fields vanish.
    pub fn query<T: Serialize + ?Sized>(mut self, query: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(query)
            .map_err(|e| ApiError::unknown(format!("Failed to serialize query: {}", e)))?;
        let Value::Object(map) = value else {
            return Err(ApiError::unknown("Query must serialize to an object"));
        };
        for (key, value) in map {
            match value {
                Value::Null => {}
                Value::String(s) => self.query.push((key, s)),
                other => self.query.push((key, other.to_string())),
            }
        }
        Ok(self)
    }

    pub fn multipart(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Turns non-2xx responses into an [`ApiError`] carrying the status.
    pub fn error_for_status(self) -> Result<Self, ApiError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ApiError::from_status(self.status.as_u16(), &self.body))
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::decode(format!("Failed to parse response: {}", e)))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// The unwrapped send function. Everything the application dispatches ends
/// up here, either directly (auth endpoints) or via [`AuthorizedClient`].
#[async_trait(?Send)]
pub trait Transport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;
}

pub struct ReqwestTransport {
    client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    pub fn from_config(cfg: &config::ClientConfig) -> Self {
        Self::new(cfg.api_base_url.clone())
    }

    fn build_form(parts: Vec<FormPart>) -> Result<reqwest::multipart::Form, ApiError> {
        let mut form = reqwest::multipart::Form::new();
        for part in parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name, value),
                FormPart::File {
                    name,
                    file_name,
                    content_type,
                    data,
                } => {
                    let file = reqwest::multipart::Part::bytes(data)
                        .file_name(file_name)
                        .mime_str(&content_type)
                        .map_err(|e| ApiError::unknown(format!("Invalid content type: {}", e)))?;
                    form.part(name, file)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait(?Send)]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .client
            .request(request.method.clone(), &url)
            .headers(request.headers);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(parts) => builder.multipart(Self::build_form(parts)?),
        };

        let response = builder.send().await.map_err(|e| {
            log::error!("{} {} failed: {}", request.method, url, e);
            ApiError::request_failed(format!("Request failed: {}", e))
        })?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::request_failed(format!("Failed to read response: {}", e)))?;
        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// Resets the in-flight flag even if the refreshing call is dropped midway.
struct RefreshFlight<'a>(&'a Cell<bool>);

impl<'a> RefreshFlight<'a> {
    fn begin(flag: &'a Cell<bool>) -> Option<Self> {
        if flag.replace(true) {
            None
        } else {
            Some(Self(flag))
        }
    }
}

impl Drop for RefreshFlight<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Decorator over the raw transport that every feature API sends through.
/// Before each call it refreshes a nearly expired token (one refresh at a
/// time) and stamps the bearer header. Clones share the transport, the
/// session and the in-flight flag, so build it once per process.
#[derive(Clone)]
pub struct AuthorizedClient {
    transport: Rc<dyn Transport>,
    auth: AuthApi,
    refreshing: Rc<Cell<bool>>,
}

impl AuthorizedClient {
    pub fn new(transport: Rc<dyn Transport>, auth: AuthApi) -> Self {
        Self {
            transport,
            auth,
            refreshing: Rc::new(Cell::new(false)),
        }
    }

    pub fn auth(&self) -> &AuthApi {
        &self.auth
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.get()
    }

    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse, ApiError> {
        self.refresh_if_expiring().await;
        self.stamp_authorization(&mut request.headers)?;
        self.transport.send(request).await
    }

    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ApiError> {
        let response = self.send(request).await?.error_for_status()?;
        response.json()
    }

    async fn refresh_if_expiring(&self) {
        let remaining = self.auth.store().get().millis_until_expiry(now_ms());
        match remaining {
            Some(ms) if ms < REFRESH_THRESHOLD_MS => {}
            _ => return,
        }
        let Some(_flight) = RefreshFlight::begin(&self.refreshing) else {
            log::debug!("Token refresh already in flight, sending with current token");
            return;
        };
        if let Err(err) = self.auth.refresh().await {
            log::warn!("Token refresh before request failed: {}", err);
        }
    }

    fn stamp_authorization(&self, headers: &mut HeaderMap) -> Result<(), ApiError> {
        let value = match self.auth.store().access_token() {
            Some(token) => HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::request_failed("Invalid token format"))?,
            None => HeaderValue::from_static(""),
        };
        headers.insert(AUTHORIZATION, value);
        Ok(())
    }
}

pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
