//! Error types for structural hashing.

use std::fmt::Display;

/// Errors that can occur while lowering or hashing a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    /// The requested digest length is outside `1..=64` hex characters.
    #[error("invalid hash length {0}: expected 1..=64 hex characters")]
    InvalidLength(usize),

    /// The value nests deeper than the serializer allows.
    #[error("value nesting exceeds the maximum depth of {limit}")]
    DepthExceeded {
        /// The depth limit that was hit.
        limit: usize,
    },

    /// An array's shape does not match the number of elements.
    #[error("array shape {shape:?} does not match {len} elements")]
    ShapeMismatch {
        /// The declared shape.
        shape: Vec<usize>,
        /// The actual number of elements.
        len: usize,
    },

    /// A wrapper produced a value of the wrong form.
    #[error("malformed {what}: {reason}")]
    Malformed {
        /// Which special form was malformed.
        what: &'static str,
        /// Description of the problem.
        reason: String,
    },

    /// A `Serialize` implementation reported an error.
    #[error("serialization failed: {0}")]
    Custom(String),
}

impl serde::ser::Error for HashError {
    fn custom<T: Display>(msg: T) -> Self {
        HashError::Custom(msg.to_string())
    }
}
