//! Memoized calls of versioned functions.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use memo_config::{CacheMode, DEFAULT_HASH_LENGTH, DEFAULT_KEY_PREFIX_LEN};
use memo_hash::{hash_value, Value};
use memo_version::VersionedFunction;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::context::Context;
use crate::error::CacheError;
use crate::handle::Cache;
use crate::signature::{BoundArgs, BoundValue, CallArgs, Signature};
use crate::store::{ReadOutcome, MAX_KEY_LEN};

/// Default cap on the length of a cache key.
pub const DEFAULT_MAX_KEY_LEN: usize = 64;

#[derive(Debug, Default)]
struct CallState {
    was_cached: bool,
    last_key: Option<String>,
    last_file: Option<String>,
}

/// A versioned function whose results are memoized in a [`Cache`].
///
/// ```
/// use std::sync::Arc;
/// use memo_cache::{Cache, CacheError, CachedFunction, CallArgs, MemoryStore, Signature};
/// use memo_version::Registry;
///
/// let registry = Registry::default();
/// let versioned = registry.version("app::area", "1.0").declare().unwrap();
/// let area = CachedFunction::new(versioned, Signature::new(["w", "h"]));
/// let cache = Cache::new(Arc::new(MemoryStore::new()));
///
/// let (w, h) = (2, 3);
/// let compute = |_: Option<Cache>| Ok::<_, CacheError>(w * h);
/// let args = || CallArgs::new().arg(&w).arg(&h);
/// assert_eq!(area.call(Some(&cache), args(), compute).unwrap(), 6);
/// assert!(!area.was_cached());
/// assert_eq!(area.call(Some(&cache), args(), compute).unwrap(), 6);
/// assert!(area.was_cached());
/// ```
#[derive(Debug)]
pub struct CachedFunction {
    versioned: Arc<VersionedFunction>,
    signature: Signature,
    exclude: BTreeSet<String>,
    exclude_types: Vec<String>,
    key_prefix_len: usize,
    hash_length: usize,
    max_key_len: usize,
    auto_verbose: Option<String>,
    version_id: OnceLock<String>,
    state: Mutex<CallState>,
}

impl CachedFunction {
    /// Wraps `versioned`, whose arguments are bound through `signature`.
    pub fn new(versioned: Arc<VersionedFunction>, signature: Signature) -> Self {
        Self {
            versioned,
            signature,
            exclude: BTreeSet::new(),
            exclude_types: Vec::new(),
            key_prefix_len: DEFAULT_KEY_PREFIX_LEN,
            hash_length: DEFAULT_HASH_LENGTH,
            max_key_len: DEFAULT_MAX_KEY_LEN,
            auto_verbose: None,
            version_id: OnceLock::new(),
            state: Mutex::new(CallState::default()),
        }
    }

    /// Leaves the named arguments out of the cache key.
    pub fn exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    /// Leaves arguments of the named types out of the cache key.
    ///
    /// A type matches by its full path or by a `::`-separated suffix of it,
    /// so `"Logger"` excludes `app::log::Logger`.
    pub fn exclude_types<I, S>(mut self, type_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_types
            .extend(type_names.into_iter().map(Into::into));
        self
    }

    /// Characters of the function name kept at the start of each key.
    pub fn key_prefix_len(mut self, len: usize) -> Self {
        self.key_prefix_len = len;
        self
    }

    /// Length of the argument hash in each key.
    pub fn hash_length(mut self, len: usize) -> Self {
        self.hash_length = len;
        self
    }

    /// Cap on the whole key, clamped to what stores accept.
    pub fn max_key_len(mut self, len: usize) -> Self {
        self.max_key_len = len.clamp(1, MAX_KEY_LEN);
        self
    }

    /// Aligns cache reports with the function's own reporting context.
    ///
    /// The argument `name` (passed with [`CallArgs::context`], quiet when
    /// omitted) is excluded from the key. Cache messages are written one
    /// level below it, and only when both it and the cache handle's
    /// verbosity allow them.
    pub fn auto_verbose(mut self, name: &str) -> Self {
        self.signature = self
            .signature
            .with_context_default(name, Context::quiet());
        self.exclude.insert(name.to_string());
        self.auto_verbose = Some(name.to_string());
        self
    }

    /// The wrapped versioned function.
    pub fn versioned(&self) -> &Arc<VersionedFunction> {
        &self.versioned
    }

    /// Whether the last call returned a stored result.
    pub fn was_cached(&self) -> bool {
        self.lock().was_cached
    }

    /// The cache key of the last call that had a cache.
    pub fn last_key(&self) -> Option<String> {
        self.lock().last_key.clone()
    }

    /// The store location of the last call that had a cache.
    pub fn last_file(&self) -> Option<String> {
        self.lock().last_file.clone()
    }

    /// The version identifier records are tagged with, resolved on first use.
    pub fn version_id(&self) -> Result<&str, CacheError> {
        if let Some(id) = self.version_id.get() {
            return Ok(id);
        }
        let id = self.versioned.full_version_id()?;
        Ok(self.version_id.get_or_init(|| id))
    }

    fn lock(&self) -> MutexGuard<'_, CallState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_excluded(&self, name: &str, bound: &BoundValue) -> bool {
        self.exclude.contains(name) || self.exclude_types.iter().any(|t| bound.is_type(t))
    }

    /// The cache key for already bound arguments.
    pub fn cache_key(&self, args: &BoundArgs) -> Result<String, CacheError> {
        let name = self.versioned.name();
        let qualified = self.versioned.qualified_name();
        let arguments = args
            .iter()
            .filter(|(n, v)| !self.is_excluded(n, v))
            .map(|(n, v)| Ok((Value::from(n), v.value()?.clone())))
            .collect::<Result<_, CacheError>>()?;
        let identity = Value::Seq(vec![
            Value::from(name.module()),
            Value::from(qualified),
            Value::Map(arguments),
        ]);
        let hash = hash_value(&identity, self.hash_length)?;

        let local = match name.owner() {
            Some(owner) => format!("{owner}_{}", name.name()),
            None => name.name().to_string(),
        };
        let prefix: String = local
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .take(self.key_prefix_len)
            .collect();
        Ok(cap_key(&prefix, &hash, self.max_key_len))
    }

    /// Calls `f` through the cache.
    ///
    /// Without a cache handle `f(None)` is called directly. Otherwise the
    /// handle's mode (or its qualify mode, if this function depends on a
    /// qualify name) decides whether a stored result is deleted, returned,
    /// or recomputed and written. `f` receives a handle one reporting
    /// level deeper for its own nested cached calls.
    ///
    /// Errors returned by `f` pass through unchanged. Binding, hashing and
    /// version errors are converted into `E`. Store failures are logged
    /// and never returned.
    pub fn call<R, E, F>(&self, cache: Option<&Cache>, args: CallArgs, f: F) -> Result<R, E>
    where
        R: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce(Option<Cache>) -> Result<R, E>,
    {
        self.lock().was_cached = false;
        let bound = self.signature.bind(args)?;
        let Some(cache) = cache else {
            return f(None);
        };

        let qualname = self.versioned.qualified_name();
        let version_id = self.version_id()?.to_string();
        let verbose = self.reporter(cache, &bound);

        let mut mode = cache.mode();
        for name in cache.qualify() {
            if self
                .versioned
                .is_dependent(name)
                .map_err(CacheError::from)?
                .is_some()
            {
                mode = cache.qualify_mode();
                verbose.write(format!(
                    "Caching mode for function '{qualname}' set to '{mode}' as it depends on '{name}'"
                ));
                tracing::warn!(function = qualname, depends_on = %name, %mode, "qualify override");
                break;
            }
        }

        let key = self.cache_key(&bound)?;
        let store = cache.store();
        let file = store.full_key_name(&key);
        {
            let mut state = self.lock();
            state.last_key = Some(key.clone());
            state.last_file = Some(file.clone());
        }

        let exists = store.exists(&key);
        if exists && mode.delete() {
            match store.delete(&key) {
                Ok(()) => verbose.write(format!("Deleted existing '{qualname}' cache {file}")),
                Err(e) => tracing::error!(function = qualname, error = %e, "failed to delete cache record"),
            }
        } else if exists && mode.read() {
            if let Some(value) = self.read_record(cache, &verbose, &key, &file, &version_id, mode) {
                self.lock().was_cached = true;
                return Ok(value);
            }
        }

        let value = f(Some(cache.sub(1)))?;

        if mode.write() {
            self.write_record(cache, &verbose, &key, &file, &version_id, &value);
        }
        Ok(value)
    }

    /// The context cache messages go to.
    fn reporter(&self, cache: &Cache, bound: &BoundArgs) -> Context {
        let Some(name) = &self.auto_verbose else {
            return cache.verbose().clone();
        };
        bound
            .get(name)
            .and_then(BoundValue::as_context)
            .cloned()
            .unwrap_or_else(Context::quiet)
            .limit(cache.verbose().verbose())
            .sub(1)
    }

    fn read_record<R: DeserializeOwned>(
        &self,
        cache: &Cache,
        verbose: &Context,
        key: &str,
        file: &str,
        version_id: &str,
        mode: CacheMode,
    ) -> Option<R> {
        let qualname = self.versioned.qualified_name();
        let store = cache.store();
        let corrupt = match store.read(key, version_id, mode.del_incomp()) {
            Ok(ReadOutcome::Hit(payload)) => match decode_payload::<R>(key, &payload) {
                Ok(value) => {
                    verbose.write(format!(
                        "Successfully read cache for '{qualname}' from '{file}' for version '{version_id}'"
                    ));
                    tracing::debug!(function = qualname, key, "cache hit");
                    return Some(value);
                }
                Err(e) => e,
            },
            Ok(ReadOutcome::Missing) => return None,
            Ok(ReadOutcome::VersionMismatch { stored, deleted }) => {
                let action = if deleted { "Deleting" } else { "Ignoring" };
                verbose.write(format!(
                    "Cache for '{qualname}' refers to version '{stored}' not '{version_id}'. {action} existing cache file '{file}'"
                ));
                tracing::warn!(function = qualname, stored = %stored, expected = version_id, deleted, "cache version mismatch");
                return None;
            }
            Err(e) => e,
        };
        tracing::error!(function = qualname, file, error = %corrupt, "corrupt cache record, deleting");
        if let Err(e) = store.delete(key) {
            tracing::error!(function = qualname, file, error = %e, "failed to delete corrupt cache record");
        }
        None
    }

    fn write_record<R: Serialize>(
        &self,
        cache: &Cache,
        verbose: &Context,
        key: &str,
        file: &str,
        version_id: &str,
        value: &R,
    ) {
        let qualname = self.versioned.qualified_name();
        let written = encode_payload(value)
            .and_then(|payload| cache.store().write(key, &payload, version_id));
        match written {
            Ok(()) => {
                verbose.write(format!(
                    "Wrote '{qualname}' cache {file} for version '{version_id}'"
                ));
                tracing::debug!(function = qualname, key, "cache written");
            }
            Err(e) => {
                tracing::error!(function = qualname, file, error = %e, "failed to write cache record");
            }
        }
    }
}

/// Joins `prefix` and `hash` with `_`, shortening the prefix first and the
/// hash only when it alone exceeds `max_len`.
fn cap_key(prefix: &str, hash: &str, max_len: usize) -> String {
    if hash.len() >= max_len {
        return hash[..max_len].to_string();
    }
    let room = max_len - hash.len() - 1;
    let prefix = &prefix[..prefix.len().min(room)];
    if prefix.is_empty() {
        hash.to_string()
    } else {
        format!("{prefix}_{hash}")
    }
}

fn encode_payload<R: Serialize>(value: &R) -> Result<Vec<u8>, CacheError> {
    bincode::serde::encode_to_vec((value,), bincode::config::standard()).map_err(|e| {
        CacheError::Serialization {
            reason: e.to_string(),
        }
    })
}

fn decode_payload<R: DeserializeOwned>(key: &str, payload: &[u8]) -> Result<R, CacheError> {
    let corrupt = |reason: String| CacheError::Corrupt {
        key: key.to_string(),
        reason,
    };
    let ((value,), read): ((R,), usize) =
        bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map_err(|e| corrupt(e.to_string()))?;
    if read != payload.len() {
        return Err(corrupt(format!(
            "{} trailing bytes after wrapped value",
            payload.len() - read
        )));
    }
    Ok(value)
}
