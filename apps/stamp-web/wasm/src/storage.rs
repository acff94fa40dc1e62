//! Browser `localStorage` as the durable entry store

use stamp_core::{KeyValueStore, StampError};
use wasm_bindgen::JsValue;
use web_sys::Storage;

pub struct LocalStorage {
    storage: Storage,
}

impl LocalStorage {
    pub fn open() -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or("No window")?;
        let storage = window.local_storage()?.ok_or("No localStorage")?;
        Ok(Self { storage })
    }
}

impl KeyValueStore for LocalStorage {
    fn get(&self, key: &str) -> Result<Option<String>, StampError> {
        self.storage.get_item(key).map_err(storage_error)
    }

    /// Fails when the browser quota is exceeded.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StampError> {
        self.storage.set_item(key, value).map_err(storage_error)
    }
}

fn storage_error(err: JsValue) -> StampError {
    StampError::Storage(err.as_string().unwrap_or_else(|| format!("{:?}", err)))
}
