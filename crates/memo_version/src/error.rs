//! Error types for version declaration and resolution.

use thiserror::Error;

/// Errors raised while declaring or resolving versions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// The entity already carries a version declaration.
    #[error("'{name}' is already versioned; use redeclare to replace it")]
    AlreadyVersioned {
        /// The qualified name that was declared twice.
        name: String,
    },

    /// A declared name is malformed.
    #[error("invalid name '{name}': {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why the name was rejected.
        reason: String,
    },

    /// The declared version string is empty.
    #[error("'{name}' declares an empty version")]
    EmptyVersion {
        /// The entity with the empty version.
        name: String,
    },

    /// A named dependency matched nothing in the registry.
    #[error("{context}: dependency '{dependency}' not found (tried {})", .attempted.join(", "))]
    NotFound {
        /// Where resolution was happening.
        context: String,
        /// The dependency as written in the declaration.
        dependency: String,
        /// Every qualified name that was looked up, in order.
        attempted: Vec<String>,
    },

    /// A named dependency refers to a namespace that has no version itself.
    #[error("{context}: cannot determine version of '{dependency}': it is not a versioned function or type")]
    NotVersioned {
        /// Where resolution was happening.
        context: String,
        /// The dependency as written in the declaration.
        dependency: String,
    },

    /// Following dependencies led back to an entity already being resolved.
    #[error("{context}: dependency cycle {}", .chain.join(" -> "))]
    Cycle {
        /// Where resolution was happening.
        context: String,
        /// The path of qualified names ending at the repeated entity.
        chain: Vec<String>,
    },

    /// A requested identifier length is too short to be useful.
    #[error("version id length must be at least 4, got {0}")]
    InvalidLength(usize),
}

/// Describes the resolution step an error occurred in.
pub(crate) fn resolution_context(current: &str, top: &str) -> String {
    if current == top {
        format!("while resolving dependencies for '{current}'")
    } else {
        format!(
            "while resolving dependencies for '{current}' (as part of resolving dependencies for '{top}')"
        )
    }
}
