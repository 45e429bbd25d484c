//! In-memory key-value backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::{KeyValueStore, StoredValue, WriteOutcome};
use crate::error::{Error, Result};

/// One slot in the map. A removed key keeps its slot with `value: None` so
/// its revision keeps counting up.
#[derive(Debug, Clone)]
struct Entry {
    value: Option<String>,
    revision: u64,
    updated_at: DateTime<Utc>,
}

impl Entry {
    fn live(&self) -> Option<StoredValue> {
        self.value.as_ref().map(|value| StoredValue {
            value: value.clone(),
            revision: self.revision,
            updated_at: self.updated_at,
        })
    }
}

/// A process-local store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key` unconditionally, bypassing the revision check.
    ///
    /// Returns the new revision.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn put_raw(&self, key: &str, value: impl Into<String>) -> Result<u64> {
        let mut entries = self.lock()?;
        let revision = entries.get(key).map_or(1, |entry| entry.revision + 1);
        entries.insert(
            key.to_string(),
            Entry {
                value: Some(value.into()),
                revision,
                updated_at: Utc::now(),
            },
        );
        Ok(revision)
    }

    /// Number of stored keys.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self
            .lock()?
            .values()
            .filter(|entry| entry.value.is_some())
            .count())
    }

    /// Check whether nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| Error::unavailable("memory store lock poisoned"))
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<StoredValue>> {
        Ok(self.lock()?.get(key).and_then(Entry::live))
    }

    fn write(&self, key: &str, value: &str, expected: Option<u64>) -> Result<WriteOutcome> {
        let mut entries = self.lock()?;
        let slot = entries.get(key);
        let current = slot.and_then(|entry| entry.value.as_ref().map(|_| entry.revision));
        if current != expected {
            return Ok(WriteOutcome::Conflict { current });
        }

        let revision = slot.map_or(1, |entry| entry.revision + 1);
        entries.insert(
            key.to_string(),
            Entry {
                value: Some(value.to_string()),
                revision,
                updated_at: Utc::now(),
            },
        );
        Ok(WriteOutcome::Written { revision })
    }

    fn remove(&self, key: &str) -> Result<bool> {
        let mut entries = self.lock()?;
        match entries.get_mut(key) {
            Some(entry) if entry.value.is_some() => {
                entry.value = None;
                entry.revision += 1;
                entry.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
