use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sonnik_backend::{build_router, config::Config, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sonnik_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        auth_base_url = %config.auth_base_url,
        ai_base_url = %config.ai_base_url,
        upstream_timeout_seconds = config.upstream_timeout_seconds,
        max_upload_bytes = config.max_upload_bytes,
        cors_allow_origins = ?config.cors_allow_origins,
        "Loaded configuration from environment/.env"
    );

    let addr = config.bind_addr;
    let app = build_router(AppState::new(config)?);

    // Start server
    tracing::info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
