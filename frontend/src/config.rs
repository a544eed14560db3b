use serde::{Deserialize, Serialize};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";

#[cfg(not(target_arch = "wasm32"))]
const API_BASE_URL_ENV: &str = "SONNIK_API_BASE_URL";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub api_base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
        }
    }
}

impl ClientConfig {
    /// Explicit value first, then `SONNIK_API_BASE_URL` on host builds, then
    /// the local proxy default. Trailing slashes are dropped so paths can be
    /// appended directly.
    pub fn resolve(explicit: Option<&str>) -> Self {
        Self::resolve_from(explicit, env_base_url)
    }

    fn resolve_from(explicit: Option<&str>, env: impl FnOnce() -> Option<String>) -> Self {
        let url = non_blank(explicit.map(str::to_string))
            .or_else(|| non_blank(env()))
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        Self {
            api_base_url: url.trim().trim_end_matches('/').to_string(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|url| !url.trim().is_empty())
}

#[cfg(not(target_arch = "wasm32"))]
fn env_base_url() -> Option<String> {
    std::env::var(API_BASE_URL_ENV).ok()
}

#[cfg(target_arch = "wasm32")]
fn env_base_url() -> Option<String> {
    None
}
