//! Transient same-origin key/value storage used to pass a recording from the
//! recorder to the upload page.

use parking_lot::Mutex;
use std::collections::HashMap;

pub trait SessionStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&self, key: &str, value: String);

    fn remove_item(&self, key: &str);
}

/// In-process storage that lives as long as the handle
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl SessionStorage for MemorySessionStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.lock().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: String) {
        self.items.lock().insert(key.to_string(), value);
    }

    fn remove_item(&self, key: &str) {
        self.items.lock().remove(key);
    }
}
