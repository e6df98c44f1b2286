//! Configuration types deserialized from `memo.toml`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;
use crate::mode::CacheMode;

/// Default cache directory: `memo` under the system temp directory.
pub const DEFAULT_CACHE_DIR: &str = "!/memo";

/// Default number of hex characters in the argument hash of a cache key.
pub const DEFAULT_HASH_LENGTH: usize = 48;

/// Default number of function-name characters leading a cache key.
pub const DEFAULT_KEY_PREFIX_LEN: usize = 12;

/// The top-level `memo.toml` configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoConfig {
    /// The `[cache]` table.
    #[serde(default)]
    pub cache: CacheSection,
}

/// Settings for cached function calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSection {
    /// Cache directory; `!` expands to the temp dir, `~` to the home dir.
    pub dir: String,
    /// Ambient cache mode.
    pub mode: CacheMode,
    /// How much progress output to print.
    pub verbose: Verbosity,
    /// Functions that force `qualify_mode` on any cached function depending on them.
    pub qualify: Vec<String>,
    /// Mode applied when a `qualify` name matches; `update` if unset.
    pub qualify_mode: Option<CacheMode>,
    /// Shortcut for `qualify` with `qualify_mode = "update"`.
    pub update: Vec<String>,
    /// Hex characters in the argument hash of a cache key.
    pub hash_length: usize,
    /// Function-name characters leading a cache key.
    pub key_prefix_len: usize,
    /// Whether payloads are gzip-compressed on disk.
    pub compress: bool,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            dir: DEFAULT_CACHE_DIR.to_string(),
            mode: CacheMode::On,
            verbose: Verbosity::Quiet,
            qualify: Vec::new(),
            qualify_mode: None,
            update: Vec::new(),
            hash_length: DEFAULT_HASH_LENGTH,
            key_prefix_len: DEFAULT_KEY_PREFIX_LEN,
            compress: false,
        }
    }
}

impl CacheSection {
    /// The qualify list and the mode it forces, merging `update` into `qualify`.
    pub fn qualify_rule(&self) -> (Vec<String>, CacheMode) {
        if self.update.is_empty() {
            (
                self.qualify.clone(),
                self.qualify_mode.unwrap_or(CacheMode::Update),
            )
        } else {
            (self.update.clone(), CacheMode::Update)
        }
    }
}

/// Verbosity limit for progress reports.
///
/// Written as `"all"`, `"quiet"` or a level: reports at a level above the
/// limit are suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Verbosity {
    /// Report everything.
    All,
    /// Report nothing.
    #[default]
    Quiet,
    /// Report levels up to and including this one.
    Level(u32),
}

impl Verbosity {
    /// Whether a report at `level` passes this limit.
    pub fn allows(self, level: u32) -> bool {
        match self {
            Verbosity::All => true,
            Verbosity::Quiet => false,
            Verbosity::Level(limit) => level <= limit,
        }
    }
}

impl FromStr for Verbosity {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Verbosity::All),
            "quiet" => Ok(Verbosity::Quiet),
            other => other
                .parse::<u32>()
                .map(Verbosity::Level)
                .map_err(|_| ConfigError::UnknownVerbosity(other.to_string())),
        }
    }
}

impl fmt::Display for Verbosity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verbosity::All => f.write_str("all"),
            Verbosity::Quiet => f.write_str("quiet"),
            Verbosity::Level(n) => write!(f, "{n}"),
        }
    }
}

impl Serialize for Verbosity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Verbosity::Level(n) => serializer.serialize_u32(*n),
            other => serializer.serialize_str(&other.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for Verbosity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Level(u32),
            Name(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Level(n) => Ok(Verbosity::Level(n)),
            Raw::Name(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_limits() {
        assert!(Verbosity::All.allows(99));
        assert!(!Verbosity::Quiet.allows(0));
        assert!(Verbosity::Level(2).allows(2));
        assert!(!Verbosity::Level(2).allows(3));
    }

    #[test]
    fn verbosity_parse() {
        assert_eq!("all".parse::<Verbosity>().unwrap(), Verbosity::All);
        assert_eq!("3".parse::<Verbosity>().unwrap(), Verbosity::Level(3));
        assert!(matches!(
            "loud".parse::<Verbosity>(),
            Err(ConfigError::UnknownVerbosity(_))
        ));
    }

    #[test]
    fn qualify_rule_prefers_update() {
        let mut section = CacheSection {
            qualify: vec!["a".into()],
            qualify_mode: Some(CacheMode::Clear),
            ..CacheSection::default()
        };
        assert_eq!(
            section.qualify_rule(),
            (vec!["a".to_string()], CacheMode::Clear)
        );
        section.qualify.clear();
        section.update = vec!["b".into()];
        assert_eq!(
            section.qualify_rule(),
            (vec!["b".to_string()], CacheMode::Update)
        );
    }

    #[test]
    fn qualify_mode_defaults_to_update() {
        let section = CacheSection {
            qualify: vec!["a".into()],
            ..CacheSection::default()
        };
        assert_eq!(section.qualify_rule().1, CacheMode::Update);
    }
}
