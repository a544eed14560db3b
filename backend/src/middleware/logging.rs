use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header::CONTENT_LENGTH, Request},
    middleware::Next,
    response::Response,
    Error as AxumError,
};
use std::time::Instant;

use super::request_id::RequestId;

const MAX_BUFFERED_BODY_BYTES: usize = 64 * 1024;
const MAX_LOGGED_BODY_BYTES: usize = 2048;

/// Logs every 4xx/5xx the proxy returns, whether produced locally or relayed
/// from an upstream. The body is buffered so it can still be sent on.
pub async fn log_error_responses(req: Request<Body>, next: Next) -> Response {
    let method = req.method().to_string();
    let path = req.uri().path().to_string();
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let start = Instant::now();

    let response = next.run(req).await;
    let status = response.status();

    if !(status.is_client_error() || status.is_server_error()) {
        return response;
    }

    let event = ErrorEvent {
        status: status.as_u16(),
        method: &method,
        path: &path,
        request_id: &request_id,
        latency_ms: start.elapsed().as_millis() as u64,
    };
    let (mut parts, body) = response.into_parts();
    match buffer_body(body).await {
        Ok((bytes, preview)) => {
            event.log(&preview, None);
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(err) => {
            parts.headers.remove(CONTENT_LENGTH);
            event.log("", Some(err));
            Response::from_parts(parts, Body::empty())
        }
    }
}

async fn buffer_body(body: Body) -> Result<(Bytes, String), AxumError> {
    let bytes = to_bytes(body, MAX_BUFFERED_BODY_BYTES).await?;
    Ok((bytes.clone(), preview(&bytes)))
}

fn preview(bytes: &[u8]) -> String {
    if bytes.len() > MAX_LOGGED_BODY_BYTES {
        format!(
            "{}... (truncated, {} bytes total)",
            String::from_utf8_lossy(&bytes[..MAX_LOGGED_BODY_BYTES]),
            bytes.len()
        )
    } else {
        String::from_utf8_lossy(bytes).to_string()
    }
}

struct ErrorEvent<'a> {
    status: u16,
    method: &'a str,
    path: &'a str,
    request_id: &'a str,
    latency_ms: u64,
}

impl ErrorEvent<'_> {
    fn log(&self, body_preview: &str, body_error: Option<AxumError>) {
        let ErrorEvent {
            status,
            method,
            path,
            request_id,
            latency_ms,
        } = *self;

        if let Some(err) = body_error {
            tracing::warn!(
                status,
                method,
                path,
                request_id,
                latency_ms,
                error = ?err,
                "Failed to read error response body"
            );
            return;
        }

        if status >= 500 {
            tracing::error!(
                status,
                method,
                path,
                request_id,
                latency_ms,
                body = body_preview,
                "Request completed with error status"
            );
        } else {
            tracing::warn!(
                status,
                method,
                path,
                request_id,
                latency_ms,
                body = body_preview,
                "Request completed with error status"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_bodies() {
        let body = vec![b'x'; MAX_LOGGED_BODY_BYTES + 10];
        let text = preview(&body);
        assert!(text.ends_with(&format!("(truncated, {} bytes total)", body.len())));
        assert_eq!(preview(b"{\"error\":\"bad\"}"), "{\"error\":\"bad\"}");
    }
}
