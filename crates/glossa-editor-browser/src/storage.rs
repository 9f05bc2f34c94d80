//! `window.localStorage` as a key-value backend.

use glossa_common::{KeyValueStore, StorageError};

#[derive(Debug, Clone)]
pub struct LocalStorageStore {
    storage: web_sys::Storage,
}

impl LocalStorageStore {
    pub fn new() -> Result<Self, StorageError> {
        let storage = gloo_utils::window()
            .local_storage()
            .map_err(|e| StorageError::Unavailable(format!("{:?}", e)))?
            .ok_or_else(|| StorageError::Unavailable("localStorage is disabled".into()))?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage
            .get_item(key)
            .map_err(|e| StorageError::Unavailable(format!("LocalStorage error: {:?}", e)))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        // Quota errors land here.
        self.storage
            .set_item(key, value)
            .map_err(|e| StorageError::Unavailable(format!("LocalStorage error: {:?}", e)))
    }
}
