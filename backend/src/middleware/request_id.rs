use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const CORRELATION_ID_HEADER: &str = "x-correlation-id";

#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Tags every request with an id, taken from the caller when present. The id
/// is written back onto the request headers so proxy handlers forward it to
/// the upstream services, and echoed on the response.
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);

    let id = req
        .headers()
        .get(&header_name)
        .or_else(|| {
            req.headers()
                .get(HeaderName::from_static(CORRELATION_ID_HEADER))
        })
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let value = HeaderValue::from_str(&id).ok();
    if let Some(value) = value.clone() {
        req.headers_mut().insert(header_name.clone(), value);
    }
    req.extensions_mut().insert(RequestId(id));

    let mut response = next.run(req).await;

    if let Some(value) = value {
        response.headers_mut().insert(header_name, value);
    }

    response
}
