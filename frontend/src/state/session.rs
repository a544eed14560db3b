use std::{cell::RefCell, rc::Rc};

use serde::{Deserialize, Serialize};

use crate::utils::storage::{SessionStorage, StorageError};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const USER_ID_KEY: &str = "user_id";
pub const EXPIRES_AT_KEY: &str = "expires_at";

/// Credentials of the signed-in user. `expires_at` is the access token expiry
/// in epoch milliseconds and only means something while `access_token` is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub user_id: Option<String>,
    pub expires_at: Option<i64>,
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn millis_until_expiry(&self, now_ms: i64) -> Option<i64> {
        self.expires_at.map(|exp| exp.saturating_sub(now_ms))
    }
}

/// Partial overwrite for [`SessionStore::set`]. `None` leaves the field alone,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUpdate {
    pub access_token: Option<Option<String>>,
    pub refresh_token: Option<Option<String>>,
    pub user_id: Option<Option<String>>,
    pub expires_at: Option<Option<i64>>,
}

impl SessionUpdate {
    fn apply(self, session: &mut Session) {
        if let Some(value) = self.access_token {
            session.access_token = value;
        }
        if let Some(value) = self.refresh_token {
            session.refresh_token = value;
        }
        if let Some(value) = self.user_id {
            session.user_id = value;
        }
        if let Some(value) = self.expires_at {
            session.expires_at = value;
        }
    }
}

/// Where the code is running. Durable storage only exists in the browser; the
/// server-rendered pass sees an empty, non-persistent store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionContext {
    Server,
    Client,
}

struct Inner {
    context: ExecutionContext,
    session: RefCell<Session>,
    storage: Option<Rc<dyn SessionStorage>>,
}

/// Process-wide session holder. Clones share state; build one at startup and
/// hand clones to everything that needs the credentials.
#[derive(Clone)]
pub struct SessionStore {
    inner: Rc<Inner>,
}

impl SessionStore {
    pub fn server() -> Self {
        Self::with_parts(ExecutionContext::Server, None)
    }

    pub fn client(storage: impl SessionStorage + 'static) -> Self {
        Self::with_parts(ExecutionContext::Client, Some(Rc::new(storage)))
    }

    #[cfg(target_arch = "wasm32")]
    pub fn browser() -> Self {
        match crate::utils::storage::BrowserStorage::new() {
            Ok(storage) => Self::client(storage),
            Err(err) => {
                log::warn!("localStorage unavailable, session will not persist: {}", err);
                Self::with_parts(ExecutionContext::Client, None)
            }
        }
    }

    fn with_parts(context: ExecutionContext, storage: Option<Rc<dyn SessionStorage>>) -> Self {
        Self {
            inner: Rc::new(Inner {
                context,
                session: RefCell::new(Session::default()),
                storage,
            }),
        }
    }

    pub fn context(&self) -> ExecutionContext {
        self.inner.context
    }

    pub fn storage_available(&self) -> bool {
        self.inner.context == ExecutionContext::Client && self.inner.storage.is_some()
    }

    pub fn get(&self) -> Session {
        self.inner.session.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.session.borrow().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.inner.session.borrow().refresh_token.clone()
    }

    pub fn user_id(&self) -> Option<String> {
        self.inner.session.borrow().user_id.clone()
    }

    pub fn expires_at(&self) -> Option<i64> {
        self.inner.session.borrow().expires_at
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.borrow().is_authenticated()
    }

    pub fn set(&self, update: SessionUpdate) -> Result<(), StorageError> {
        update.apply(&mut self.inner.session.borrow_mut());
        self.persist()
    }

    /// Swaps all four fields at once. Login, register and refresh go through
    /// here so no field of the previous session survives.
    pub fn replace(&self, session: Session) -> Result<(), StorageError> {
        *self.inner.session.borrow_mut() = session;
        self.persist()
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.replace(Session::default())
    }

    pub fn persist(&self) -> Result<(), StorageError> {
        let Some(storage) = self.reachable_storage() else {
            return Ok(());
        };
        let session = self.get();
        write_item(storage, ACCESS_TOKEN_KEY, session.access_token.as_deref())?;
        write_item(storage, REFRESH_TOKEN_KEY, session.refresh_token.as_deref())?;
        write_item(storage, USER_ID_KEY, session.user_id.as_deref())?;
        let expires_at = session.expires_at.map(|exp| exp.to_string());
        write_item(storage, EXPIRES_AT_KEY, expires_at.as_deref())
    }

    /// Overwrites the in-memory snapshot from storage. Missing, empty or
    /// unparsable entries come back as unset fields.
    pub fn restore(&self) -> Result<(), StorageError> {
        let Some(storage) = self.reachable_storage() else {
            return Ok(());
        };
        let restored = Session {
            access_token: read_item(storage, ACCESS_TOKEN_KEY)?,
            refresh_token: read_item(storage, REFRESH_TOKEN_KEY)?,
            user_id: read_item(storage, USER_ID_KEY)?,
            expires_at: read_item(storage, EXPIRES_AT_KEY)?
                .and_then(|raw| raw.trim().parse::<i64>().ok()),
        };
        *self.inner.session.borrow_mut() = restored;
        Ok(())
    }

    fn reachable_storage(&self) -> Option<&dyn SessionStorage> {
        if self.inner.context != ExecutionContext::Client {
            return None;
        }
        self.inner.storage.as_deref()
    }
}

fn write_item(
    storage: &dyn SessionStorage,
    key: &str,
    value: Option<&str>,
) -> Result<(), StorageError> {
    match value {
        Some(value) => storage.set_item(key, value),
        None => storage.remove_item(key),
    }
}

fn read_item(storage: &dyn SessionStorage, key: &str) -> Result<Option<String>, StorageError> {
    Ok(storage.get_item(key)?.filter(|value| !value.is_empty()))
}


#[cfg(all(test, target_arch = "wasm32"))]
mod browser_tests {
    use super::*;
    use crate::utils::storage::BrowserStorage;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn browser_store_persists_and_restores() {
        let store = SessionStore::browser();
        assert!(store.storage_available());
        let session = Session {
            access_token: Some("A1".into()),
            refresh_token: Some("R1".into()),
            user_id: Some("U1".into()),
            expires_at: Some(1_767_225_600_000),
        };
        store.replace(session.clone()).unwrap();

        let raw = BrowserStorage::new().unwrap();
        assert_eq!(
            raw.get_item(EXPIRES_AT_KEY).unwrap().as_deref(),
            Some("1767225600000")
        );

        let reopened = SessionStore::browser();
        reopened.restore().unwrap();
        assert_eq!(reopened.get(), session);

        reopened.clear().unwrap();
        assert!(raw.get_item(ACCESS_TOKEN_KEY).unwrap().is_none());
        assert!(raw.get_item(EXPIRES_AT_KEY).unwrap().is_none());
    }
}
