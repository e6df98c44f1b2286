//! The cache-mode policy table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConfigError;

/// How a cached call treats its record.
///
/// | mode       | read | write | delete | delete on mismatch |
/// |------------|------|-------|--------|--------------------|
/// | `on`       | yes  | yes   | no     | yes                |
/// | `gen`      | yes  | yes   | no     | no                 |
/// | `off`      | no   | no    | no     | no                 |
/// | `clear`    | no   | no    | yes    | no                 |
/// | `update`   | no   | yes   | yes    | yes                |
/// | `readonly` | yes  | no    | no     | no                 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CacheMode {
    /// Read existing records and write new ones.
    #[default]
    On,
    /// Like `on`, but keep records whose version does not match.
    Gen,
    /// Bypass the cache entirely.
    Off,
    /// Delete existing records and do not write.
    Clear,
    /// Delete existing records, recompute and write.
    Update,
    /// Read existing records, never write.
    ReadOnly,
}

impl CacheMode {
    /// Every mode, in table order.
    pub const ALL: [CacheMode; 6] = [
        CacheMode::On,
        CacheMode::Gen,
        CacheMode::Off,
        CacheMode::Clear,
        CacheMode::Update,
        CacheMode::ReadOnly,
    ];

    /// The configuration name of this mode.
    pub fn name(self) -> &'static str {
        match self {
            CacheMode::On => "on",
            CacheMode::Gen => "gen",
            CacheMode::Off => "off",
            CacheMode::Clear => "clear",
            CacheMode::Update => "update",
            CacheMode::ReadOnly => "readonly",
        }
    }

    const fn flags(self) -> (bool, bool, bool, bool) {
        match self {
            CacheMode::On => (true, true, false, true),
            CacheMode::Gen => (true, true, false, false),
            CacheMode::Off => (false, false, false, false),
            CacheMode::Clear => (false, false, true, false),
            CacheMode::Update => (false, true, true, true),
            CacheMode::ReadOnly => (true, false, false, false),
        }
    }

    /// Whether existing records may be returned.
    pub fn read(self) -> bool {
        self.flags().0
    }

    /// Whether computed results are written.
    pub fn write(self) -> bool {
        self.flags().1
    }

    /// Whether an existing record is deleted before the call.
    pub fn delete(self) -> bool {
        self.flags().2
    }

    /// Whether a record with a mismatching version is deleted.
    pub fn del_incomp(self) -> bool {
        self.flags().3
    }

    /// Whether the cache is bypassed.
    pub fn is_off(self) -> bool {
        self == CacheMode::Off
    }
}

impl FromStr for CacheMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheMode::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| ConfigError::UnknownCacheMode(s.to_string()))
    }
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for CacheMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for CacheMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_table() {
        let expected = [
            (CacheMode::On, [true, true, false, true]),
            (CacheMode::Gen, [true, true, false, false]),
            (CacheMode::Off, [false, false, false, false]),
            (CacheMode::Clear, [false, false, true, false]),
            (CacheMode::Update, [false, true, true, true]),
            (CacheMode::ReadOnly, [true, false, false, false]),
        ];
        for (mode, flags) in expected {
            assert_eq!(
                [mode.read(), mode.write(), mode.delete(), mode.del_incomp()],
                flags,
                "{mode}"
            );
        }
    }

    #[test]
    fn parse_names() {
        for mode in CacheMode::ALL {
            assert_eq!(mode.name().parse::<CacheMode>().unwrap(), mode);
            assert_eq!(mode.to_string(), mode.name());
        }
    }

    #[test]
    fn parse_is_case_sensitive() {
        let err = "ON".parse::<CacheMode>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownCacheMode(ref s) if s == "ON"));
        assert!("read_only".parse::<CacheMode>().is_err());
        assert!("".parse::<CacheMode>().is_err());
    }

    #[test]
    fn default_is_on() {
        assert_eq!(CacheMode::default(), CacheMode::On);
        assert!(CacheMode::Off.is_off());
        assert!(!CacheMode::Gen.is_off());
    }

    #[test]
    fn serde_uses_names() {
        let json = serde_json::to_string(&CacheMode::ReadOnly).unwrap();
        assert_eq!(json, "\"readonly\"");
        let back: CacheMode = serde_json::from_str("\"update\"").unwrap();
        assert_eq!(back, CacheMode::Update);
        assert!(serde_json::from_str::<CacheMode>("\"Update\"").is_err());
    }
}
