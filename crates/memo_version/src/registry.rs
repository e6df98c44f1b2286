//! The table of version declarations.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::error::VersionError;
use crate::versioned::{Dependency, Entries, EntityKind, QualifiedName, VersionedFunction};

/// A shared table of versioned functions and types keyed by qualified name.
///
/// Cloning is cheap; clones refer to the same table.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Arc<Entries>,
}

static GLOBAL: OnceLock<Registry> = OnceLock::new();

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry.
    pub fn global() -> &'static Registry {
        GLOBAL.get_or_init(Registry::new)
    }

    /// Starts a declaration of `name` at `version`.
    ///
    /// ```
    /// use memo_version::Registry;
    ///
    /// let registry = Registry::new();
    /// let h = registry.version("app::h", "0.3").declare().unwrap();
    /// let f = registry
    ///     .version("app::f", "0.1")
    ///     .depends_on(&h)
    ///     .declare()
    ///     .unwrap();
    /// assert_eq!(f.full_version_string().unwrap(), "0.1 { app::h: 0.3 }");
    /// ```
    pub fn version(&self, name: &str, version: &str) -> Declaration<'_> {
        Declaration {
            registry: self,
            name: name.to_string(),
            version: version.to_string(),
            kind: EntityKind::Function,
            dependencies: Vec::new(),
        }
    }

    /// Declares function `name` at `version` with `dependencies`.
    pub fn declare<I>(
        &self,
        name: &str,
        version: &str,
        dependencies: I,
    ) -> Result<Arc<VersionedFunction>, VersionError>
    where
        I: IntoIterator,
        I::Item: Into<Dependency>,
    {
        self.version(name, version)
            .depends_on_all(dependencies)
            .declare()
    }

    /// Declares type `name` at `version` with `dependencies`.
    pub fn declare_type<I>(
        &self,
        name: &str,
        version: &str,
        dependencies: I,
    ) -> Result<Arc<VersionedFunction>, VersionError>
    where
        I: IntoIterator,
        I::Item: Into<Dependency>,
    {
        self.version(name, version)
            .as_type()
            .depends_on_all(dependencies)
            .declare()
    }

    /// Declares type `name` derived from `base`. The base becomes the
    /// first dependency unless `dependencies` already lists it.
    pub fn declare_derived<I>(
        &self,
        name: &str,
        version: &str,
        dependencies: I,
        base: &Arc<VersionedFunction>,
    ) -> Result<Arc<VersionedFunction>, VersionError>
    where
        I: IntoIterator,
        I::Item: Into<Dependency>,
    {
        self.version(name, version)
            .depends_on_all(dependencies)
            .derived_from(base)
            .declare()
    }

    /// Looks up a declaration by its exact qualified name.
    pub fn get(&self, name: &str) -> Option<Arc<VersionedFunction>> {
        self.read().get(name).cloned()
    }

    /// Sorted qualified names of every declaration.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of declarations.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether nothing has been declared.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Finds every group of declarations that depend on each other in a
    /// loop, without resolving any versions. Names that resolve to nothing
    /// are ignored. Each group is sorted, as is the list of groups.
    pub fn find_cycles(&self) -> Vec<Vec<String>> {
        let entries = self.read();
        let mut graph: DiGraph<String, ()> = DiGraph::new();
        let mut index: HashMap<String, NodeIndex> = HashMap::new();
        for name in entries.keys() {
            index.insert(name.clone(), graph.add_node(name.clone()));
        }
        let mut self_loops = Vec::new();
        for (name, f) in entries.iter() {
            let from = index[name];
            for dep in f.input_dependencies() {
                let target = match dep {
                    Dependency::Direct(d) => Some(d.qualified_name().to_string()),
                    Dependency::Name(n) => f
                        .name()
                        .lookup_candidates(n)
                        .into_iter()
                        .find(|c| entries.contains_key(c)),
                };
                let Some(to) = target.and_then(|t| index.get(&t).copied()) else {
                    continue;
                };
                if from == to {
                    self_loops.push(vec![name.clone()]);
                }
                graph.add_edge(from, to, ());
            }
        }
        drop(entries);

        let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1)
            .map(|scc| {
                let mut names: Vec<String> = scc.into_iter().map(|n| graph[n].clone()).collect();
                names.sort();
                names
            })
            .chain(self_loops)
            .collect();
        cycles.sort();
        cycles.dedup();
        cycles
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<VersionedFunction>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn insert(&self, decl: Declaration<'_>, replace: bool) -> Result<Arc<VersionedFunction>, VersionError> {
        let name = QualifiedName::parse(&decl.name)?;
        if decl.version.trim().is_empty() {
            return Err(VersionError::EmptyVersion { name: decl.name });
        }
        let f = Arc::new(VersionedFunction::new(
            name,
            decl.kind,
            decl.version,
            decl.dependencies,
            Arc::downgrade(&self.entries),
        ));
        let key = f.qualified_name().to_string();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if !replace && entries.contains_key(&key) {
            return Err(VersionError::AlreadyVersioned { name: key });
        }
        tracing::debug!(entity = %key, version = f.input_version(), replace, "declared version");
        entries.insert(key, Arc::clone(&f));
        Ok(f)
    }
}

/// A pending version declaration, built by [`Registry::version`].
#[must_use = "a declaration does nothing until `declare` is called"]
pub struct Declaration<'r> {
    registry: &'r Registry,
    name: String,
    version: String,
    kind: EntityKind,
    dependencies: Vec<Dependency>,
}

impl Declaration<'_> {
    /// Adds a dependency, by name or by direct reference.
    pub fn depends_on(mut self, dep: impl Into<Dependency>) -> Self {
        self.dependencies.push(dep.into());
        self
    }

    /// Adds several dependencies.
    pub fn depends_on_all<I>(mut self, deps: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Dependency>,
    {
        self.dependencies.extend(deps.into_iter().map(Into::into));
        self
    }

    /// Declares a type rather than a function.
    pub fn as_type(mut self) -> Self {
        self.kind = EntityKind::Type;
        self
    }

    /// Declares a type derived from `base`, whose version becomes an
    /// implicit dependency.
    pub fn derived_from(mut self, base: &Arc<VersionedFunction>) -> Self {
        self.kind = EntityKind::Type;
        let listed = self.dependencies.iter().any(|d| match d {
            Dependency::Direct(f) => Arc::ptr_eq(f, base),
            Dependency::Name(n) => n == base.qualified_name(),
        });
        if !listed {
            self.dependencies.insert(0, Dependency::from(base));
        }
        self
    }

    /// Registers the declaration; fails if the name is already versioned.
    pub fn declare(self) -> Result<Arc<VersionedFunction>, VersionError> {
        let registry = self.registry;
        registry.insert(self, false)
    }

    /// Registers the declaration, replacing any previous one.
    ///
    /// Entities that already resolved against the old declaration keep
    /// their pinned version.
    pub fn redeclare(self) -> Result<Arc<VersionedFunction>, VersionError> {
        let registry = self.registry;
        registry.insert(self, true)
    }
}
