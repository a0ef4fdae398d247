use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// A value written by the producer: an opaque blob (media, url) or a list of strings (text).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    Data(Vec<u8>),
    Strings(Vec<String>),
}

impl StoredValue {
    pub fn kind(&self) -> &'static str {
        match self {
            StoredValue::Data(_) => "data",
            StoredValue::Strings(_) => "strings",
        }
    }

    pub fn as_data(&self) -> Option<&[u8]> {
        match self {
            StoredValue::Data(bytes) => Some(bytes),
            StoredValue::Strings(_) => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            StoredValue::Strings(values) => Some(values),
            StoredValue::Data(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
    #[error("stored value for '{key}' has unknown kind '{kind}'")]
    UnknownKind { key: String, kind: String },
    #[error("store lock poisoned")]
    Poisoned,
}

/// Key/value store shared by the producer and consumer processes.
///
/// Entries are scoped to [`SharedStore::namespace`]; both sides must open the
/// same namespace to see each other's writes.
pub trait SharedStore {
    fn namespace(&self) -> &str;
    fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError>;
    fn set(&self, key: &str, value: StoredValue) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<bool, StoreError>;
}

impl<T: SharedStore + ?Sized> SharedStore for Arc<T> {
    fn namespace(&self) -> &str {
        (**self).namespace()
    }

    fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: StoredValue) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        (**self).remove(key)
    }
}

/// In-process store, for tests and single-process hosts.
#[derive(Debug, Default)]
pub struct MemoryStore {
    namespace: String,
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SharedStore for MemoryStore {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn get(&self, key: &str) -> Result<Option<StoredValue>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: StoredValue) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.remove(key).is_some())
    }
}
