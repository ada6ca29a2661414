//! Persistent keyed storage contract.
//!
//! Both the endpoint registry and the token cache persist through this
//! interface. Values are opaque strings; the stores above it serialize
//! their entries as JSON. Keys are namespaced by the caller
//! (`<namespace>/<provider>`), so one storage instance can back several
//! stores.

use crate::error::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

/// Keyed string storage.
///
/// Implementations are expected to behave like a local/session storage
/// tier: synchronous, last-write-wins, fully replacing the value for a
/// key on every insert.
pub trait Storage: Send + Sync {
    /// Insert or overwrite a value.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written.
    fn insert(&self, key: &str, value: &str) -> Result<()>;

    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Remove a value, returning it when present.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be written.
    fn remove(&self, key: &str) -> Result<Option<String>>;

    /// Enumerate all keys.
    ///
    /// # Errors
    ///
    /// Returns error if the backing store cannot be read.
    fn keys(&self) -> Result<Vec<String>>;
}

/// In-process storage backed by a mutex-guarded map.
///
/// This is the default store for hosts without a persistence tier and the
/// test double for everything built on [`Storage`].
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    /// Create an empty in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Storage for MemoryStorage {
    fn insert(&self, key: &str, value: &str) -> Result<()> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().remove(key))
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock().keys().cloned().collect())
    }
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn insert(&self, key: &str, value: &str) -> Result<()> {
        (**self).insert(key, value)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn remove(&self, key: &str) -> Result<Option<String>> {
        (**self).remove(key)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }
}
