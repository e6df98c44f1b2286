//! An in-process store for tests and short-lived caches.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::CacheError;
use crate::store::{validate_key, ReadOutcome, Store};

#[derive(Debug, Clone)]
struct Record {
    version: String,
    payload: Vec<u8>,
}

/// A [`Store`] that keeps records in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<String, Record>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Replaces the raw payload of an existing record, keeping its version.
    pub fn overwrite_payload(&self, key: &str, payload: Vec<u8>) -> bool {
        match self.lock().get_mut(key) {
            Some(record) => {
                record.payload = payload;
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for MemoryStore {
    fn exists(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    fn read_version(&self, key: &str) -> Option<String> {
        self.lock().get(key).map(|r| r.version.clone())
    }

    fn read(
        &self,
        key: &str,
        expected_version: &str,
        delete_mismatch: bool,
    ) -> Result<ReadOutcome, CacheError> {
        let mut records = self.lock();
        let Some(record) = records.get(key) else {
            return Ok(ReadOutcome::Missing);
        };
        if record.version == expected_version {
            return Ok(ReadOutcome::Hit(record.payload.clone()));
        }
        let stored = record.version.clone();
        if delete_mismatch {
            records.remove(key);
        }
        Ok(ReadOutcome::VersionMismatch {
            stored,
            deleted: delete_mismatch,
        })
    }

    fn write(&self, key: &str, payload: &[u8], version: &str) -> Result<(), CacheError> {
        validate_key(key)?;
        self.lock().insert(
            key.to_string(),
            Record {
                version: version.to_string(),
                payload: payload.to_vec(),
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.lock().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn full_key_name(&self, key: &str) -> String {
        format!("memory:{key}")
    }

    fn clear(&self) -> Result<usize, CacheError> {
        let mut records = self.lock();
        let n = records.len();
        records.clear();
        Ok(n)
    }
}
