//! Generic key-value store trait and in-memory implementation.

use std::collections::HashMap;

/// Generic key-value store for the persisted redirect record.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Option<serde_json::Value>;
    fn set(&mut self, key: &str, value: serde_json::Value);
}

// --- Memory Implementation ---

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: HashMap<String, serde_json::Value>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: serde_json::Value) {
        self.data.insert(key.to_string(), value);
    }
}
