//! HTTP proxy in front of the Sonnik auth and AI services.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod state;

use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{config::Config, state::AppState};

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let upload_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/api/health", get(handlers::health::health))
        .route("/api/login", post(handlers::auth::login))
        .route("/api/register", post(handlers::auth::register))
        .route("/api/refresh", post(handlers::auth::refresh))
        .route("/api/interpret", post(handlers::chats::interpret))
        .route(
            "/api/chats",
            get(handlers::chats::list_chats).post(handlers::chats::create_chat),
        )
        .route("/api/chats/{chat_id}", patch(handlers::chats::rename_chat))
        .route(
            "/api/chats/{chat_id}/messages",
            get(handlers::chats::get_messages),
        )
        .route(
            "/api/folders",
            get(handlers::folders::list_folders).post(handlers::folders::create_folder),
        )
        .route("/api/tts", post(handlers::speech::tts))
        .route(
            "/api/asr",
            post(handlers::speech::asr).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum_middleware::from_fn(middleware::request_id::request_id))
                .layer(TraceLayer::new_for_http())
                .layer(axum_middleware::from_fn(
                    middleware::logging::log_error_responses,
                ))
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let origins = if config.allows_any_origin() {
        AllowOrigin::from(Any)
    } else {
        let list: Vec<HeaderValue> = config
            .cors_allow_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(list)
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(std::time::Duration::from_secs(24 * 60 * 60))
}
