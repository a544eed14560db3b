use std::{cell::RefCell, collections::HashMap, rc::Rc};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("No window object")]
    NoWindow,
    #[error("No localStorage")]
    Unavailable,
    #[error("Failed to read {0}")]
    Read(String),
    #[error("Failed to write {0}")]
    Write(String),
}

/// Key/value surface of the browser's `localStorage`, narrowed to what the
/// session mirror needs.
pub trait SessionStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// In-process storage used on host builds and in tests. Clones share the same
/// map, so a test can keep a handle and inspect what the store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    items: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }
}

impl SessionStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.items.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.items.borrow_mut().remove(key);
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
pub use browser::{local_storage, window, BrowserStorage};

#[cfg(target_arch = "wasm32")]
mod browser {
    use super::{SessionStorage, StorageError};
    use web_sys::{Storage, Window};

    pub fn window() -> Result<Window, StorageError> {
        web_sys::window().ok_or(StorageError::NoWindow)
    }

    pub fn local_storage() -> Result<Storage, StorageError> {
        window()?
            .local_storage()
            .map_err(|_| StorageError::Unavailable)?
            .ok_or(StorageError::Unavailable)
    }

    pub struct BrowserStorage {
        storage: Storage,
    }

    impl BrowserStorage {
        pub fn new() -> Result<Self, StorageError> {
            Ok(Self {
                storage: local_storage()?,
            })
        }
    }

    impl SessionStorage for BrowserStorage {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.storage
                .get_item(key)
                .map_err(|_| StorageError::Read(key.to_string()))
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.storage
                .set_item(key, value)
                .map_err(|_| StorageError::Write(key.to_string()))
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.storage
                .remove_item(key)
                .map_err(|_| StorageError::Write(key.to_string()))
        }
    }
}
