//! Client side of the Sonnik assistant: session persistence, token refresh,
//! authenticated request dispatch, navigation guards, and the chat and voice
//! APIs built on top of them.

use std::rc::Rc;

pub mod api;
pub mod config;
pub mod router;
pub mod state;
pub mod utils;

use api::{AuthApi, AuthorizedClient, ChatApi, ReqwestTransport, Transport, VoiceApi};
use router::RouteGuard;
use state::session::SessionStore;

/// Everything the UI needs, wired once per process around a single session
/// store and a single authorized client.
#[derive(Clone)]
pub struct AppContext {
    pub store: SessionStore,
    pub auth: AuthApi,
    pub client: AuthorizedClient,
    pub chat: ChatApi,
    pub voice: VoiceApi,
    pub router: RouteGuard,
}

impl AppContext {
    /// Hydrates the store from storage before anything can send a request.
    pub fn new(store: SessionStore, transport: Rc<dyn Transport>) -> Self {
        if let Err(err) = store.restore() {
            log::warn!("Starting without a stored session: {}", err);
        }
        let auth = AuthApi::new(transport.clone(), store.clone());
        let client = AuthorizedClient::new(transport, auth.clone());
        Self {
            chat: ChatApi::new(client.clone()),
            voice: VoiceApi::new(client.clone()),
            router: RouteGuard::new(store.clone()),
            store,
            auth,
            client,
        }
    }

    pub fn from_config(store: SessionStore, cfg: &config::ClientConfig) -> Self {
        Self::new(store, Rc::new(ReqwestTransport::from_config(cfg)))
    }

    #[cfg(target_arch = "wasm32")]
    pub fn browser() -> Self {
        Self::from_config(SessionStore::browser(), &config::ClientConfig::resolve(None))
    }
}

#[cfg(target_arch = "wasm32")]
pub fn init_logging() {
    if console_log::init_with_level(log::Level::Debug).is_err() {
        web_sys::console::warn_1(&"Logger already initialized".into());
    }
}
