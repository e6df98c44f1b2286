//! Version declarations and transitive dependency resolution.
//!
//! Functions and types are declared in a [`Registry`] with a version string
//! and a list of dependencies, named or given directly. The first time an
//! entity's version is needed its dependencies are resolved recursively into
//! a [`VersionTree`], which is then pinned for the life of the declaration.
//! The rendered tree and its bounded [`VersionedFunction::unique_id`] form
//! the code identity that cache records are stamped with.

#![warn(missing_docs)]

pub mod error;
pub mod registry;
pub mod tree;
pub mod versioned;

pub use error::VersionError;
pub use registry::{Declaration, Registry};
pub use tree::VersionTree;
pub use versioned::{Dependency, EntityKind, QualifiedName, VersionedFunction};
