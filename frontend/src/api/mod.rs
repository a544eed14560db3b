pub mod auth;
mod chat;
pub mod client;
pub mod types;
mod voice;

pub use auth::AuthApi;
pub use chat::ChatApi;
pub use client::*;
pub use types::*;
pub use voice::*;

#[cfg(all(test, not(target_arch = "wasm32")))]
pub mod test_support;
