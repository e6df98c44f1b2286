//! Folding [`Value`] trees into fixed-length hex digests.
//!
//! Each node is hashed on its own with a leading type tag; container nodes
//! fold the digests of their children. Sets sort child digests, maps sort
//! entries by key digest and objects sort fields by name, which makes the
//! result independent of iteration and declaration order.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::HashError;
use crate::ser::to_value;
use crate::value::Value;

/// Digest length used for cache keys.
pub const DEFAULT_HASH_LENGTH: usize = 48;

/// Longest digest available, in hex characters.
pub const MAX_HASH_LENGTH: usize = 64;

const TAG_UNIT: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_UINT: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_STR: u8 = 5;
const TAG_BYTES: u8 = 6;
const TAG_SEQ: u8 = 7;
const TAG_SET: u8 = 8;
const TAG_MAP: u8 = 9;
const TAG_OBJECT: u8 = 10;
const TAG_VARIANT: u8 = 11;
const TAG_ARRAY: u8 = 12;
const TAG_CODE: u8 = 13;
const TAG_DIGEST: u8 = 14;

type NodeDigest = [u8; 32];

fn update_str(h: &mut Sha256, s: &str) {
    h.update((s.len() as u64).to_le_bytes());
    h.update(s.as_bytes());
}

/// Maps `-0.0` to `0.0` and every NaN to one canonical NaN.
fn canonical_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0
    } else {
        f.to_bits()
    }
}

fn node_digest(value: &Value) -> NodeDigest {
    let mut h = Sha256::new();
    match value {
        Value::Unit => h.update([TAG_UNIT]),
        Value::Bool(b) => h.update([TAG_BOOL, u8::from(*b)]),
        Value::Int(i) => {
            h.update([TAG_INT]);
            h.update(i.to_le_bytes());
        }
        Value::UInt(u) => {
            h.update([TAG_UINT]);
            h.update(u.to_le_bytes());
        }
        Value::Float(f) => {
            h.update([TAG_FLOAT]);
            h.update(canonical_bits(*f).to_le_bytes());
        }
        Value::Str(s) => {
            h.update([TAG_STR]);
            h.update(s.as_bytes());
        }
        Value::Bytes(b) => {
            h.update([TAG_BYTES]);
            h.update(b);
        }
        Value::Seq(items) => {
            h.update([TAG_SEQ]);
            for item in items {
                h.update(node_digest(item));
            }
        }
        Value::Set(items) => {
            h.update([TAG_SET]);
            let mut digests: Vec<NodeDigest> = items.iter().map(node_digest).collect();
            digests.sort_unstable();
            for d in &digests {
                h.update(d);
            }
        }
        Value::Map(entries) => {
            h.update([TAG_MAP]);
            let mut pairs: Vec<(NodeDigest, NodeDigest)> = entries
                .iter()
                .map(|(k, v)| (node_digest(k), node_digest(v)))
                .collect();
            pairs.sort_unstable();
            for (k, v) in &pairs {
                h.update(k);
                h.update(v);
            }
        }
        Value::Object { name, fields } => {
            h.update([TAG_OBJECT]);
            update_str(&mut h, name);
            let mut sorted: Vec<&(String, Value)> = fields.iter().collect();
            sorted.sort_unstable_by(|a, b| a.0.cmp(&b.0));
            for (field, v) in sorted {
                update_str(&mut h, field);
                h.update(node_digest(v));
            }
        }
        Value::Variant {
            name,
            variant,
            payload,
        } => {
            h.update([TAG_VARIANT]);
            update_str(&mut h, name);
            update_str(&mut h, variant);
            h.update(node_digest(payload));
        }
        Value::Array { dtype, shape, data } => {
            h.update([TAG_ARRAY]);
            update_str(&mut h, dtype);
            h.update((shape.len() as u64).to_le_bytes());
            for dim in shape {
                h.update(dim.to_le_bytes());
            }
            h.update(data);
        }
        Value::Code(code) => {
            h.update([TAG_CODE]);
            h.update(code.as_bytes());
        }
        Value::Digest(d) => {
            h.update([TAG_DIGEST]);
            h.update(d.as_bytes());
        }
    }
    h.finalize().into()
}

/// Returns the first `length` hex characters of the digest of `value`.
pub fn hash_value(value: &Value, length: usize) -> Result<String, HashError> {
    if length == 0 || length > MAX_HASH_LENGTH {
        return Err(HashError::InvalidLength(length));
    }
    let mut hex = hex::encode(node_digest(value));
    hex.truncate(length);
    Ok(hex)
}

/// Hashes any serializable value into `length` hex characters.
pub fn unique_hash<T: Serialize + ?Sized>(value: &T, length: usize) -> Result<String, HashError> {
    if length == 0 || length > MAX_HASH_LENGTH {
        return Err(HashError::InvalidLength(length));
    }
    hash_value(&to_value(value)?, length)
}

/// 32 character [`unique_hash`].
pub fn unique_hash32<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
    unique_hash(value, 32)
}

/// 48 character [`unique_hash`], the cache key default.
pub fn unique_hash48<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
    unique_hash(value, DEFAULT_HASH_LENGTH)
}

/// 64 character [`unique_hash`].
pub fn unique_hash64<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
    unique_hash(value, MAX_HASH_LENGTH)
}
