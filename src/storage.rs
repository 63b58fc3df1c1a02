//! Key-value storage used to persist favorites.
//!
//! The application stores its data in eframe's persistent storage. [`MemoryStore`] keeps the
//! same contract in memory, for tests and for running without persistence.

use std::collections::HashMap;

/// A string key-value store.
pub trait KeyValueStore {
    /// Reads the value stored under `key`.
    fn get_string(&self, key: &str) -> Option<String>;

    /// Overwrites the value stored under `key`.
    fn set_string(&mut self, key: &str, value: String);

    /// Makes previous writes durable.
    fn flush(&mut self) {}
}

impl<'a> KeyValueStore for dyn eframe::Storage + 'a {
    fn get_string(&self, key: &str) -> Option<String> {
        eframe::Storage::get_string(self, key)
    }

    fn set_string(&mut self, key: &str, value: String) {
        eframe::Storage::set_string(self, key, value);
    }

    fn flush(&mut self) {
        eframe::Storage::flush(self);
    }
}

/// An in-memory store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
    flushes: usize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding a single value.
    pub fn with_value(key: &str, value: impl Into<String>) -> Self {
        let mut store = Self::default();
        store.values.insert(key.to_string(), value.into());
        store
    }

    /// How many times the store was flushed.
    pub fn flushes(&self) -> usize {
        self.flushes
    }
}

impl KeyValueStore for MemoryStore {
    fn get_string(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set_string(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    fn flush(&mut self) {
        self.flushes += 1;
    }
}
