//! Disk-backed memoization of versioned functions.
//!
//! A [`CachedFunction`] pairs a [`memo_version::VersionedFunction`] with a
//! [`Signature`]. Each call binds its arguments, hashes them into a cache
//! key and consults the [`Store`] of the [`Cache`] handle it was given,
//! returning the stored result when the record's version matches and
//! recomputing and writing it back otherwise. What is read, written or
//! deleted is governed by the handle's [`CacheMode`].
//!
//! Store failures never reach the caller: missing records are misses and
//! corrupt records are logged, deleted and recomputed. Errors returned by
//! the wrapped computation pass through unchanged.

#![warn(missing_docs)]

pub mod cached;
pub mod context;
pub mod dir_store;
pub mod error;
pub mod handle;
pub mod memory_store;
pub mod path;
pub mod signature;
pub mod store;

pub use cached::{CachedFunction, DEFAULT_MAX_KEY_LEN};
pub use context::{Context, ReportSink};
pub use dir_store::DirStore;
pub use error::CacheError;
pub use handle::Cache;
pub use memo_config::{CacheMode, Verbosity};
pub use memory_store::MemoryStore;
pub use path::expand_path;
pub use signature::{BoundArgs, BoundValue, CallArgs, Signature};
pub use store::{validate_key, ReadOutcome, Store};
