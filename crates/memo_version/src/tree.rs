//! Resolved version trees and their canonical rendering.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The resolved version of an entity together with the versions of
/// everything it depends on.
///
/// Renders as `v` for an entity without dependencies and as
/// `v { a: va, b: vb { c: vc } }` otherwise, dependencies sorted by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionTree {
    /// An entity without dependencies.
    Leaf(String),
    /// An entity with at least one dependency.
    Node {
        /// The entity's own declared version.
        version: String,
        /// Resolved dependency trees keyed by qualified name.
        dependencies: BTreeMap<String, VersionTree>,
    },
}

impl VersionTree {
    /// Builds a tree, collapsing to a leaf when there are no dependencies.
    pub fn new(version: impl Into<String>, dependencies: BTreeMap<String, VersionTree>) -> Self {
        let version = version.into();
        if dependencies.is_empty() {
            VersionTree::Leaf(version)
        } else {
            VersionTree::Node {
                version,
                dependencies,
            }
        }
    }

    /// The entity's own declared version.
    pub fn version(&self) -> &str {
        match self {
            VersionTree::Leaf(v) => v,
            VersionTree::Node { version, .. } => version,
        }
    }

    /// Direct dependencies, empty for a leaf.
    pub fn dependencies(&self) -> impl Iterator<Item = (&str, &VersionTree)> {
        let deps = match self {
            VersionTree::Leaf(_) => None,
            VersionTree::Node { dependencies, .. } => Some(dependencies),
        };
        deps.into_iter()
            .flat_map(|d| d.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Depth-first search for a dependency whose name matches `name`.
    ///
    /// A name matches when it equals the qualified name or is one of its
    /// trailing `::` segments, so `Model::fit` matches `app::Model::fit`.
    pub fn find(&self, name: &str) -> Option<&str> {
        for (dep, tree) in self.dependencies() {
            if name_matches(dep, name) {
                return Some(tree.version());
            }
            if let Some(v) = tree.find(name) {
                return Some(v);
            }
        }
        None
    }

    /// Number of entities in the tree, this one included.
    pub fn len(&self) -> usize {
        1 + self.dependencies().map(|(_, t)| t.len()).sum::<usize>()
    }

    /// Always false; a tree holds at least its own entity.
    pub fn is_empty(&self) -> bool {
        false
    }
}

pub(crate) fn name_matches(qualified: &str, name: &str) -> bool {
    qualified == name
        || qualified
            .strip_suffix(name)
            .is_some_and(|rest| rest.ends_with("::"))
}

impl fmt::Display for VersionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionTree::Leaf(v) => write!(f, "{v}"),
            VersionTree::Node {
                version,
                dependencies,
            } => {
                write!(f, "{version} {{ ")?;
                for (i, (name, tree)) in dependencies.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {tree}")?;
                }
                write!(f, " }}")
            }
        }
    }
}
