use anyhow::anyhow;
use std::{env, net::SocketAddr};

pub const DEFAULT_AUTH_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_AI_BASE_URL: &str = "http://127.0.0.1:9090";

#[derive(Debug, Clone)]
pub struct Config {
    pub auth_base_url: String,
    pub ai_base_url: String,
    pub bind_addr: SocketAddr,
    pub upstream_timeout_seconds: u64,
    pub max_upload_bytes: usize,
    pub cors_allow_origins: Vec<String>,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let auth_base_url = base_url_var("AUTH_BASE_URL", DEFAULT_AUTH_BASE_URL);
        let ai_base_url = base_url_var("AI_BASE_URL", DEFAULT_AI_BASE_URL);

        let bind_raw = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_addr: SocketAddr = bind_raw
            .parse()
            .map_err(|_| anyhow!("Invalid BIND_ADDR value: {}", bind_raw))?;

        let upstream_timeout_seconds = env::var("UPSTREAM_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let max_upload_bytes = env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| (25 * 1024 * 1024).to_string())
            .parse()
            .unwrap_or(25 * 1024 * 1024);

        let cors_allow_origins = parse_origins(
            &env::var("CORS_ALLOW_ORIGINS").unwrap_or_else(|_| "*".to_string()),
        );

        Ok(Config {
            auth_base_url,
            ai_base_url,
            bind_addr,
            upstream_timeout_seconds,
            max_upload_bytes,
            cors_allow_origins,
        })
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_allow_origins.is_empty() || self.cors_allow_origins.iter().any(|o| o == "*")
    }
}

fn base_url_var(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
        .trim()
        .trim_end_matches('/')
        .to_string()
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
