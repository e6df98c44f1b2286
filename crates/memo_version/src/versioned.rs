//! Versioned entities and recursive dependency resolution.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, Weak};

use memo_common::unique_label;
use memo_hash::{HashError, UniqueHashable};

use crate::error::{resolution_context, VersionError};
use crate::tree::{name_matches, VersionTree};

pub(crate) type Entries = RwLock<HashMap<String, Arc<VersionedFunction>>>;

/// Length of [`VersionedFunction::full_version_id`].
pub const FULL_VERSION_ID_LENGTH: usize = 48;

/// Whether a declaration describes a function or a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A free function or method.
    Function,
    /// A type; derived types depend on their base.
    Type,
}

/// A `::`-separated path split into module, owning type and item name.
///
/// A segment directly before the item that starts with an uppercase letter
/// is taken to be the owning type, so `app::Model::fit` is method `fit` of
/// `Model` in module `app`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    module: String,
    owner: Option<String>,
    name: String,
}

impl QualifiedName {
    /// Splits `path` into its parts.
    pub fn parse(path: &str) -> Result<Self, VersionError> {
        let invalid = |reason: &str| VersionError::InvalidName {
            name: path.to_string(),
            reason: reason.to_string(),
        };
        if path.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        let mut segments: Vec<&str> = path.split("::").collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid("empty path segment"));
        }
        if segments.iter().any(|s| s.chars().any(char::is_whitespace)) {
            return Err(invalid("path segments may not contain whitespace"));
        }
        let name = segments.pop().unwrap_or_default().to_string();
        let owner = match segments.last() {
            Some(seg) if seg.starts_with(|c: char| c.is_ascii_uppercase()) => {
                segments.pop().map(str::to_string)
            }
            _ => None,
        };
        Ok(Self {
            module: segments.join("::"),
            owner,
            name,
        })
    }

    /// The module path, empty for a top-level item.
    pub fn module(&self) -> &str {
        &self.module
    }

    /// The owning type of a method.
    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// The item's own name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Joins `parts` onto the module path.
    fn in_module(&self, parts: &[&str]) -> String {
        let mut all: Vec<&str> = Vec::with_capacity(parts.len() + 1);
        if !self.module.is_empty() {
            all.push(&self.module);
        }
        all.extend_from_slice(parts);
        all.join("::")
    }

    /// Candidate registry keys for a dependency written as `dep` inside this
    /// entity: the name as given, then relative to the module, then relative
    /// to the owning type.
    pub(crate) fn lookup_candidates(&self, dep: &str) -> Vec<String> {
        let mut out = vec![dep.to_string()];
        let mut push = |c: String| {
            if !out.contains(&c) {
                out.push(c);
            }
        };
        push(self.in_module(&[dep]));
        if let Some(owner) = &self.owner {
            push(self.in_module(&[owner, dep]));
        }
        out
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.owner {
            Some(owner) => write!(f, "{}", self.in_module(&[owner, &self.name])),
            None => write!(f, "{}", self.in_module(&[&self.name])),
        }
    }
}

/// A dependency as written in a declaration.
#[derive(Debug, Clone)]
pub enum Dependency {
    /// Looked up in the registry when first resolved.
    Name(String),
    /// A direct reference to another declaration.
    Direct(Arc<VersionedFunction>),
}

impl From<&str> for Dependency {
    fn from(name: &str) -> Self {
        Dependency::Name(name.to_string())
    }
}

impl From<String> for Dependency {
    fn from(name: String) -> Self {
        Dependency::Name(name)
    }
}

impl From<Arc<VersionedFunction>> for Dependency {
    fn from(f: Arc<VersionedFunction>) -> Self {
        Dependency::Direct(f)
    }
}

impl From<&Arc<VersionedFunction>> for Dependency {
    fn from(f: &Arc<VersionedFunction>) -> Self {
        Dependency::Direct(Arc::clone(f))
    }
}

/// A declared function or type with its input version and dependencies.
///
/// The full version is resolved lazily on first use and then pinned: a
/// later redeclaration of a dependency does not change it.
#[derive(Debug)]
pub struct VersionedFunction {
    qualified: String,
    name: QualifiedName,
    kind: EntityKind,
    version: String,
    dependencies: Vec<Dependency>,
    registry: Weak<Entries>,
    resolved: OnceLock<VersionTree>,
}

impl VersionedFunction {
    pub(crate) fn new(
        name: QualifiedName,
        kind: EntityKind,
        version: String,
        dependencies: Vec<Dependency>,
        registry: Weak<Entries>,
    ) -> Self {
        Self {
            qualified: name.to_string(),
            name,
            kind,
            version,
            dependencies,
            registry,
            resolved: OnceLock::new(),
        }
    }

    /// The fully qualified name this entity is registered under.
    pub fn qualified_name(&self) -> &str {
        &self.qualified
    }

    /// The parsed name.
    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    /// Function or type.
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// The version as declared, without dependencies.
    pub fn input_version(&self) -> &str {
        &self.version
    }

    /// Dependencies as declared.
    pub fn input_dependencies(&self) -> &[Dependency] {
        &self.dependencies
    }

    /// Whether the version tree has been resolved and pinned.
    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Resolves and pins the version tree.
    pub fn resolve(&self) -> Result<&VersionTree, VersionError> {
        if let Some(tree) = self.resolved.get() {
            return Ok(tree);
        }
        let mut path = Vec::new();
        self.resolve_within(&mut path, &self.qualified)
    }

    fn resolve_within(
        &self,
        path: &mut Vec<String>,
        top: &str,
    ) -> Result<&VersionTree, VersionError> {
        if let Some(tree) = self.resolved.get() {
            return Ok(tree);
        }
        if path.contains(&self.qualified) {
            let mut chain = path.clone();
            chain.push(self.qualified.clone());
            let current = path.last().map_or(top, String::as_str);
            return Err(VersionError::Cycle {
                context: resolution_context(current, top),
                chain,
            });
        }
        path.push(self.qualified.clone());
        let mut dependencies = BTreeMap::new();
        for dep in &self.dependencies {
            let target = match dep {
                Dependency::Direct(f) => Arc::clone(f),
                Dependency::Name(n) => self.lookup(n, top)?,
            };
            let tree = target.resolve_within(path, top)?.clone();
            dependencies.insert(target.qualified.clone(), tree);
        }
        path.pop();

        let tree = VersionTree::new(self.version.clone(), dependencies);
        tracing::debug!(entity = %self.qualified, version = %tree, "resolved version");
        Ok(self.resolved.get_or_init(|| tree))
    }

    fn lookup(&self, dep: &str, top: &str) -> Result<Arc<VersionedFunction>, VersionError> {
        let attempted = self.name.lookup_candidates(dep);
        let context = || resolution_context(&self.qualified, top);
        let Some(entries) = self.registry.upgrade() else {
            return Err(VersionError::NotFound {
                context: context(),
                dependency: dep.to_string(),
                attempted,
            });
        };
        let entries = entries.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = attempted.iter().find_map(|c| entries.get(c)) {
            return Ok(Arc::clone(found));
        }
        let is_namespace = attempted.iter().any(|c| {
            let prefix = format!("{c}::");
            entries.keys().any(|k| k.starts_with(&prefix))
        });
        if is_namespace {
            return Err(VersionError::NotVersioned {
                context: context(),
                dependency: dep.to_string(),
            });
        }
        Err(VersionError::NotFound {
            context: context(),
            dependency: dep.to_string(),
            attempted,
        })
    }

    /// The canonical rendered version tree, e.g. `1.0 { app::g: 0.2 }`.
    pub fn full_version_string(&self) -> Result<String, VersionError> {
        Ok(self.resolve()?.to_string())
    }

    /// The version bounded to `max_len` characters.
    ///
    /// Versions that fit are returned unchanged; longer ones keep a
    /// readable prefix followed by a content hash suffix of 8 characters,
    /// or 4 when `max_len` is 16 or less.
    pub fn unique_id(&self, max_len: usize) -> Result<String, VersionError> {
        if max_len < 4 {
            return Err(VersionError::InvalidLength(max_len));
        }
        let id_len = if max_len > 16 { 8 } else { 4 };
        let version = self.full_version_string()?;
        unique_label(&version, max_len, id_len).map_err(|_| VersionError::InvalidLength(max_len))
    }

    /// The version identifier stored with cache records.
    pub fn full_version_id(&self) -> Result<String, VersionError> {
        self.unique_id(FULL_VERSION_ID_LENGTH)
    }

    /// The version under which `name` participates in this entity's
    /// identity: its own input version if `name` names this entity, the
    /// version of a transitive dependency that matches, or `None`.
    pub fn is_dependent(&self, name: &str) -> Result<Option<String>, VersionError> {
        if name_matches(&self.qualified, name) {
            return Ok(Some(self.version.clone()));
        }
        Ok(self.resolve()?.find(name).map(str::to_string))
    }
}

impl UniqueHashable for VersionedFunction {
    fn unique_hash(&self, length: usize) -> Result<String, HashError> {
        self.unique_id(length.max(4))
            .map_err(|e| HashError::Custom(e.to_string()))
    }
}
