//! Error types for cache operations.

use std::path::PathBuf;

use memo_config::ConfigError;
use memo_hash::HashError;
use memo_version::VersionError;

/// Errors that can occur during cache operations.
///
/// Store-level variants are recovered from inside [`crate::CachedFunction`]
/// and never reach its caller; configuration, version and binding errors do.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing cache files.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A record file has an invalid or missing header.
    #[error("invalid record header in {path}: {reason}")]
    InvalidHeader {
        /// The record file path.
        path: PathBuf,
        /// Description of the header problem.
        reason: String,
    },

    /// The stored checksum does not match the checksum of the payload.
    #[error("checksum mismatch in {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The record file path.
        path: PathBuf,
        /// The checksum from the header.
        expected: String,
        /// The checksum computed from the payload.
        actual: String,
    },

    /// The record was written in an incompatible file format.
    #[error("format version mismatch in {path}: expected {expected}, got {actual}")]
    FormatMismatch {
        /// The record file path.
        path: PathBuf,
        /// The format version this build writes.
        expected: u32,
        /// The format version found in the file.
        actual: u32,
    },

    /// A payload could not be encoded or decoded.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// A stored payload is not a single wrapped value of the expected type.
    #[error("corrupt record '{key}': {reason}")]
    Corrupt {
        /// The record key.
        key: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// A key contains characters a store cannot use.
    #[error("invalid cache key '{key}': {reason}")]
    InvalidKey {
        /// The rejected key.
        key: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A cache location could not be expanded into a directory.
    #[error("cannot expand cache location '{location}': {reason}")]
    Location {
        /// The location as given.
        location: String,
        /// Why expansion failed.
        reason: String,
    },

    /// Call arguments do not fit the function's signature.
    #[error("argument binding failed: {0}")]
    Binding(String),

    /// An argument could not be hashed.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// The function's version could not be resolved.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// The cache configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io {
            path: path.into(),
            source,
        }
    }
}
