//! The cache handle passed down a call chain.

use std::sync::Arc;

use memo_config::{CacheMode, CacheSection};

use crate::context::Context;
use crate::dir_store::DirStore;
use crate::error::CacheError;
use crate::store::Store;

/// Where and how cached functions store their results.
///
/// A handle is passed explicitly to each cached call. Nested calls receive
/// [`Cache::sub`], which reports one level deeper and shares the store.
/// Every `with_*` method returns a modified copy; the original is untouched.
#[derive(Debug, Clone)]
pub struct Cache {
    store: Arc<dyn Store>,
    mode: CacheMode,
    verbose: Context,
    qualify: Vec<String>,
    qualify_mode: CacheMode,
}

impl Cache {
    /// A handle over `store` in mode `on`, reporting nothing.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            mode: CacheMode::On,
            verbose: Context::quiet(),
            qualify: Vec::new(),
            qualify_mode: CacheMode::Update,
        }
    }

    /// A handle over a [`DirStore`] at `location`.
    pub fn open(location: &str) -> Result<Self, CacheError> {
        Ok(Self::new(Arc::new(DirStore::open(location)?)))
    }

    /// A handle built from the `[cache]` table of `memo.toml`.
    pub fn from_config(section: &CacheSection) -> Result<Self, CacheError> {
        let store = DirStore::open(&section.dir)?.with_compression(section.compress);
        let (qualify, qualify_mode) = section.qualify_rule();
        Ok(Self::new(Arc::new(store))
            .with_mode(section.mode)
            .with_verbose(Context::new(section.verbose))
            .with_qualify(qualify, qualify_mode))
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// The ambient cache mode.
    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    /// The reporting context.
    pub fn verbose(&self) -> &Context {
        &self.verbose
    }

    /// Names whose dependents use [`Cache::qualify_mode`].
    pub fn qualify(&self) -> &[String] {
        &self.qualify
    }

    /// The mode forced on functions depending on a qualify name.
    pub fn qualify_mode(&self) -> CacheMode {
        self.qualify_mode
    }

    /// A copy using `mode`.
    pub fn with_mode(&self, mode: CacheMode) -> Self {
        Self {
            mode,
            ..self.clone()
        }
    }

    /// A copy reporting through `verbose`.
    pub fn with_verbose(&self, verbose: Context) -> Self {
        Self {
            verbose,
            ..self.clone()
        }
    }

    /// A copy writing to `store`.
    pub fn with_store(&self, store: Arc<dyn Store>) -> Self {
        Self {
            store,
            ..self.clone()
        }
    }

    /// A copy in which any function depending on one of `names` runs in
    /// `mode` instead of the ambient mode.
    pub fn with_qualify<I, S>(&self, names: I, mode: CacheMode) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            qualify: names.into_iter().map(Into::into).collect(),
            qualify_mode: mode,
            ..self.clone()
        }
    }

    /// Shortcut for [`Cache::with_qualify`] in mode `update`: recompute
    /// everything that depends on `names` without bumping versions.
    pub fn with_update<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with_qualify(names, CacheMode::Update)
    }

    /// A copy reporting `level` levels deeper, for nested calls.
    pub fn sub(&self, level: u32) -> Self {
        Self {
            verbose: self.verbose.sub(level),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_store::MemoryStore;
    use memo_config::Verbosity;

    fn memory_cache() -> Cache {
        Cache::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn defaults() {
        let cache = memory_cache();
        assert_eq!(cache.mode(), CacheMode::On);
        assert!(cache.verbose().is_quiet());
        assert!(cache.qualify().is_empty());
        assert_eq!(cache.qualify_mode(), CacheMode::Update);
    }

    #[test]
    fn copies_do_not_affect_original() {
        let cache = memory_cache();
        let off = cache.with_mode(CacheMode::Off);
        assert_eq!(off.mode(), CacheMode::Off);
        assert_eq!(cache.mode(), CacheMode::On);
        assert!(Arc::ptr_eq(off.store(), cache.store()));
    }

    #[test]
    fn sub_deepens_level_and_shares_store() {
        let cache = memory_cache().with_verbose(Context::all());
        let child = cache.sub(1).sub(1);
        assert_eq!(child.verbose().level(), 2);
        assert_eq!(cache.verbose().level(), 0);
        assert!(Arc::ptr_eq(child.store(), cache.store()));
    }

    #[test]
    fn update_shortcut() {
        let cache = memory_cache().with_update(["app::g"]);
        assert_eq!(cache.qualify(), ["app::g".to_string()]);
        assert_eq!(cache.qualify_mode(), CacheMode::Update);
        let cleared = cache.with_qualify(["app::h"], CacheMode::Clear);
        assert_eq!(cleared.qualify_mode(), CacheMode::Clear);
        assert_eq!(cache.qualify(), ["app::g".to_string()]);
    }

    #[test]
    fn from_config_section() {
        let dir = tempfile::tempdir().unwrap();
        let section = CacheSection {
            dir: dir.path().display().to_string(),
            mode: CacheMode::Gen,
            verbose: Verbosity::Level(1),
            update: vec!["app::f".into()],
            ..CacheSection::default()
        };
        let cache = Cache::from_config(&section).unwrap();
        assert_eq!(cache.mode(), CacheMode::Gen);
        assert_eq!(cache.verbose().verbose(), Verbosity::Level(1));
        assert_eq!(cache.qualify(), ["app::f".to_string()]);
        assert_eq!(cache.qualify_mode(), CacheMode::Update);
    }
}
