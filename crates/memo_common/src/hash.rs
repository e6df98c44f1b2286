//! Short content fingerprints for record checksums and label suffixes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An XXH3-128 fingerprint of a byte buffer.
///
/// Guards on-disk cache records against torn or tampered payloads and
/// supplies the suffix of truncated labels. Cache keys use the SHA-256
/// digest of `memo_hash` instead.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash([u8; 16]);

impl ContentHash {
    /// Fingerprints `data`.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(xxhash_rust::xxh3::xxh3_128(data).to_le_bytes())
    }

    /// Fingerprints the UTF-8 bytes of `text`.
    pub fn from_str_content(text: &str) -> Self {
        Self::from_bytes(text.as_bytes())
    }

    /// Whether `data` still has this fingerprint.
    pub fn matches(&self, data: &[u8]) -> bool {
        *self == Self::from_bytes(data)
    }

    /// The first `len` hex characters, at most 32.
    pub fn hex_prefix(&self, len: usize) -> String {
        let mut hex = self.to_string();
        hex.truncate(len.min(32));
        hex
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.hex_prefix(8))
    }
}
