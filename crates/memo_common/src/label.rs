//! Bounded human-readable labels.
//!
//! A label is kept verbatim while it fits into `max_length` characters.
//! Longer labels are cut and suffixed with a short content hash of the
//! full text, so two long labels sharing a prefix still differ.

use crate::hash::ContentHash;

/// Errors produced when a label cannot be formed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LabelError {
    /// The id suffix is empty, longer than a content hash, or longer than the label.
    #[error("label length {max_length} cannot hold an id of {id_length} characters")]
    TooShort {
        /// Requested maximum label length.
        max_length: usize,
        /// Requested hash suffix length.
        id_length: usize,
    },
}

/// Returns `label` unchanged if it has at most `max_length` characters,
/// otherwise a prefix of `label` followed by `id_length` hex characters
/// of its content hash, `max_length` characters in total.
pub fn unique_label(label: &str, max_length: usize, id_length: usize) -> Result<String, LabelError> {
    if id_length == 0 || id_length > 32 || id_length > max_length {
        return Err(LabelError::TooShort {
            max_length,
            id_length,
        });
    }
    if label.chars().count() <= max_length {
        return Ok(label.to_string());
    }
    let keep = max_length - id_length;
    let mut out: String = label.chars().take(keep).collect();
    out.push_str(&ContentHash::from_str_content(label).hex_prefix(id_length));
    Ok(out)
}
