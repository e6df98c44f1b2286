//! Expansion of cache location shorthands.

use std::path::{Path, PathBuf};

use crate::error::CacheError;

/// Expands a cache location into a directory path.
///
/// A leading `!` stands for the system temp directory, `~` for the user's
/// home directory and `.` for the working directory, each followed by
/// nothing or by a path separator. Any other location is used as given.
pub fn expand_path(location: &str) -> Result<PathBuf, CacheError> {
    let fail = |reason: &str| CacheError::Location {
        location: location.to_string(),
        reason: reason.to_string(),
    };
    if location.trim().is_empty() {
        return Err(fail("location is empty"));
    }
    let Some(first) = location.chars().next() else {
        return Err(fail("location is empty"));
    };
    let rest = &location[first.len_utf8()..];
    let is_prefix = rest.is_empty() || rest.starts_with(['/', '\\']);
    if !is_prefix {
        return Ok(PathBuf::from(location));
    }
    let base = match first {
        '!' => std::env::temp_dir(),
        '~' => dirs::home_dir().ok_or_else(|| fail("could not determine home directory"))?,
        '.' => std::env::current_dir().map_err(|e| fail(&e.to_string()))?,
        _ => return Ok(PathBuf::from(location)),
    };
    Ok(join_rest(&base, rest))
}

fn join_rest(base: &Path, rest: &str) -> PathBuf {
    let rest = rest.trim_start_matches(['/', '\\']);
    if rest.is_empty() {
        base.to_path_buf()
    } else {
        base.join(rest)
    }
}
