//! Structural, deterministic hashing of argument values.
//!
//! Any `serde::Serialize` value is first lowered into a canonical [`Value`]
//! tree by a dedicated serializer, then folded into a SHA-256 digest. The
//! fold is insensitive to map key order and struct field order, skips
//! fields and map keys starting with `_`, and is stable across processes.
//!
//! Special forms are opted into through wrappers:
//!
//! - [`Unique`] / [`serialize_unique`] defer to a type's own
//!   [`UniqueHashable`] implementation instead of walking its fields.
//! - [`Unordered`] folds a collection as a set. Serde cannot tell a
//!   `HashSet` apart from a sequence, so an unwrapped `HashSet` is hashed
//!   in iteration order; wrap it, or use a `BTreeSet`.
//! - [`NdArray`] hashes numeric buffers as dtype, shape, and raw bytes.
//! - [`Code`] and [`CodeFingerprint`] hash closures by their normalized
//!   source text.

#![warn(missing_docs)]

pub mod array;
pub mod code;
pub mod digest;
pub mod error;
pub mod ser;
pub mod unique;
pub mod value;

pub use array::{Element, NdArray};
pub use code::{Code, CodeFingerprint};
pub use digest::{
    hash_value, unique_hash, unique_hash32, unique_hash48, unique_hash64, DEFAULT_HASH_LENGTH,
    MAX_HASH_LENGTH,
};
pub use error::HashError;
pub use ser::{to_value, MAX_DEPTH};
pub use unique::{serialize_unique, Unique, UniqueHashable, Unordered};
pub use value::Value;
