use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
};
use sonnik_backend::middleware::request_id::{request_id, RequestId};
use tower::ServiceExt;
use uuid::Uuid;

mod support;

use support::{body_json, proxy, UNREACHABLE_BASE_URL};

fn echo_app() -> axum::Router {
    axum::Router::new()
        .route(
            "/test",
            axum::routing::get(
                |axum::Extension(id): axum::Extension<RequestId>, headers: HeaderMap| async move {
                    let header = headers
                        .get("x-request-id")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    format!("{}|{}", id.0, header)
                },
            ),
        )
        .layer(axum::middleware::from_fn(request_id))
}

#[tokio::test]
async fn test_request_id_header_added_to_response() {
    let response = echo_app()
        .oneshot(Request::builder().uri("/test").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let id = response.headers().get("x-request-id").unwrap().to_str().unwrap();
    assert!(Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn test_request_id_header_persists_client_id() {
    let client_id = "client-req-123";
    let response = echo_app()
        .oneshot(
            Request::builder()
                .uri("/test")
                .header("x-request-id", client_id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers().get("x-request-id").unwrap(), client_id);
}

#[tokio::test]
async fn test_correlation_id_is_promoted_to_request_id() {
    let correlation_id = "corr-req-456";
    let response = echo_app()
        .oneshot(
            Request::builder()
                .uri("/test")
                .header("x-correlation-id", correlation_id)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        correlation_id
    );
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"corr-req-456|corr-req-456");
}

#[tokio::test]
async fn test_generated_id_is_visible_to_handlers() {
    let response = echo_app()
        .oneshot(Request::builder().uri("/test").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let id = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(String::from_utf8_lossy(&body), format!("{}|{}", id, id));
}

#[tokio::test]
async fn test_health_route_is_tagged() {
    let response = proxy(UNREACHABLE_BASE_URL, UNREACHABLE_BASE_URL)
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_json(response).await["status"], "ok");
}
