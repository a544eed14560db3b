#![allow(dead_code)]
use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{Request, State},
    http::HeaderMap,
    middleware::{self as axum_middleware, Next},
    response::Response,
    Router,
};
use serde_json::Value;
use sonnik_backend::{build_router, config::Config, state::AppState};
use std::sync::{Arc, Mutex};

/// Nothing listens here; connections are refused right away.
pub const UNREACHABLE_BASE_URL: &str = "http://127.0.0.1:1";

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("recorded body is json")
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Recorder(Arc<Mutex<Vec<RecordedRequest>>>);

impl Recorder {
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.0.lock().expect("lock recorder").clone()
    }

    pub fn count(&self) -> usize {
        self.0.lock().expect("lock recorder").len()
    }

    pub fn last(&self) -> RecordedRequest {
        self.requests()
            .pop()
            .expect("upstream received at least one request")
    }
}

async fn record(State(recorder): State<Recorder>, req: Request, next: Next) -> Response {
    let (parts, body) = req.into_parts();
    let bytes = to_bytes(body, usize::MAX).await.expect("read upstream body");
    recorder
        .0
        .lock()
        .expect("lock recorder")
        .push(RecordedRequest {
            method: parts.method.to_string(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers.clone(),
            body: bytes.clone(),
        });
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

/// Serves `router` as a fake upstream on an ephemeral port and returns its
/// base URL plus a log of every request it received.
pub async fn spawn_upstream(router: Router) -> (String, Recorder) {
    let recorder = Recorder::default();
    let app = router.layer(axum_middleware::from_fn_with_state(
        recorder.clone(),
        record,
    ));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake upstream");
    let addr = listener.local_addr().expect("fake upstream addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve fake upstream");
    });
    (format!("http://{}", addr), recorder)
}

pub fn test_config(auth_base_url: &str, ai_base_url: &str) -> Config {
    Config {
        auth_base_url: auth_base_url.to_string(),
        ai_base_url: ai_base_url.to_string(),
        bind_addr: "127.0.0.1:0".parse().expect("bind addr"),
        upstream_timeout_seconds: 5,
        max_upload_bytes: 1024 * 1024,
        cors_allow_origins: vec!["*".to_string()],
    }
}

pub fn proxy(auth_base_url: &str, ai_base_url: &str) -> Router {
    let state = AppState::new(test_config(auth_base_url, ai_base_url)).expect("app state");
    build_router(state)
}

pub async fn body_bytes(response: Response) -> Bytes {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body")
}

pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).expect("json body")
}

pub fn json_request(method: &str, uri: &str, body: Value) -> axum::http::Request<Body> {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

pub const MULTIPART_BOUNDARY: &str = "sonnik-test-boundary";

/// `(name, file_name, content_type, data)`; a `None` file name makes a text field.
pub fn multipart_body(parts: &[(&str, Option<&str>, &str, &[u8])]) -> Body {
    let mut body = Vec::new();
    for (name, file_name, content_type, data) in parts {
        body.extend_from_slice(format!("--{}\r\n", MULTIPART_BOUNDARY).as_bytes());
        match file_name {
            Some(file_name) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                    name, file_name, content_type
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    Body::from(body)
}
