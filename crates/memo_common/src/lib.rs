//! Shared foundational types used across the memo workspace.
//!
//! This crate provides the short content fingerprint used for integrity
//! checks and label suffixes, and the bounded "readable label plus hash"
//! helper used for version identifiers and cache file names.

#![warn(missing_docs)]

pub mod hash;
pub mod label;

pub use hash::ContentHash;
pub use label::{unique_label, LabelError};
