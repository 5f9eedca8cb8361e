use anyhow::{Result, anyhow};
use gloo_storage::{LocalStorage, Storage, errors::StorageError};
use pf_storage::DisconnectFlagStore;

/// Disconnect flag kept in `localStorage`, so it is scoped to the page origin.
pub struct LocalStorageFlagStore {
    key: String,
}

impl LocalStorageFlagStore {
    pub fn new(key: &str) -> Self {
        Self { key: key.to_owned() }
    }
}

impl DisconnectFlagStore for LocalStorageFlagStore {
    fn load_disconnected(&self) -> Result<bool> {
        match LocalStorage::get::<bool>(&self.key) {
            Ok(flag) => Ok(flag),
            Err(StorageError::KeyNotFound(_)) => Ok(false),
            // StorageError carries a JsValue, which anyhow cannot hold.
            Err(err) => Err(anyhow!("reading {}: {err}", self.key)),
        }
    }

    fn save_disconnected(&self, disconnected: bool) -> Result<()> {
        if disconnected {
            LocalStorage::set(&self.key, true).map_err(|err| anyhow!("writing {}: {err}", self.key))
        } else {
            LocalStorage::delete(&self.key);
            Ok(())
        }
    }
}
