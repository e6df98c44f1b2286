//! The key/value store contract cached functions write through.

use std::fmt;

use crate::error::CacheError;

/// Longest key any store accepts.
pub const MAX_KEY_LEN: usize = 200;

/// Result of reading a record with an expected version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The record exists and carries the expected version.
    Hit(Vec<u8>),
    /// No record under this key.
    Missing,
    /// A record exists but was written for another version.
    VersionMismatch {
        /// The version tag found in the record.
        stored: String,
        /// Whether the record was deleted.
        deleted: bool,
    },
}

/// A store of version-tagged byte payloads.
///
/// Implementations must tolerate concurrent use; concurrent writers to
/// the same key race and the last write stands.
pub trait Store: Send + Sync + fmt::Debug {
    /// Whether a record exists under `key`.
    fn exists(&self, key: &str) -> bool;

    /// The version tag of the record under `key`, without reading its payload.
    fn read_version(&self, key: &str) -> Option<String>;

    /// Reads the payload under `key` if its version tag is `expected_version`.
    ///
    /// A record with another version is deleted when `delete_mismatch` is
    /// set. Errors mean the record exists but could not be decoded.
    fn read(
        &self,
        key: &str,
        expected_version: &str,
        delete_mismatch: bool,
    ) -> Result<ReadOutcome, CacheError>;

    /// Writes `payload` under `key`, tagged with `version`.
    fn write(&self, key: &str, payload: &[u8], version: &str) -> Result<(), CacheError>;

    /// Deletes the record under `key`; deleting a missing key succeeds.
    fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Every key in the store, sorted.
    fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// A human-readable location of the record under `key`.
    fn full_key_name(&self, key: &str) -> String;

    /// Deletes every record and returns how many were removed.
    fn clear(&self) -> Result<usize, CacheError> {
        let keys = self.keys()?;
        for key in &keys {
            self.delete(key)?;
        }
        Ok(keys.len())
    }
}

/// Checks that `key` is safe to use as a file stem.
///
/// Keys are non-empty, at most [`MAX_KEY_LEN`] characters of
/// `[A-Za-z0-9_.-]`, and do not start with `.`.
pub fn validate_key(key: &str) -> Result<(), CacheError> {
    let invalid = |reason: &str| CacheError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.is_empty() {
        return Err(invalid("key is empty"));
    }
    if key.len() > MAX_KEY_LEN {
        return Err(invalid("key is too long"));
    }
    if key.starts_with('.') {
        return Err(invalid("key may not start with '.'"));
    }
    if let Some(c) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(invalid(&format!("character {c:?} is not allowed")));
    }
    Ok(())
}
