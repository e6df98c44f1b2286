//! Configuration file loading and validation.

use std::path::Path;

use crate::error::ConfigError;
use crate::types::MemoConfig;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "memo.toml";

/// Loads and validates `memo.toml` from `project_dir`.
///
/// A missing file yields the default configuration.
pub fn load_config(project_dir: &Path) -> Result<MemoConfig, ConfigError> {
    let config_path = project_dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return Ok(MemoConfig::default());
    }
    let content = std::fs::read_to_string(&config_path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `memo.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<MemoConfig, ConfigError> {
    let config: MemoConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &MemoConfig) -> Result<(), ConfigError> {
    let cache = &config.cache;
    if cache.dir.trim().is_empty() {
        return Err(ConfigError::MissingField("cache.dir".to_string()));
    }
    if !cache.update.is_empty() && (!cache.qualify.is_empty() || cache.qualify_mode.is_some()) {
        return Err(ConfigError::Conflict(
            "'cache.update' cannot be combined with 'cache.qualify' or 'cache.qualify_mode'"
                .to_string(),
        ));
    }
    if !(1..=64).contains(&cache.hash_length) {
        return Err(ConfigError::ValidationError(format!(
            "cache.hash_length must be between 1 and 64, got {}",
            cache.hash_length
        )));
    }
    if cache.key_prefix_len > 64 {
        return Err(ConfigError::ValidationError(format!(
            "cache.key_prefix_len must be at most 64, got {}",
            cache.key_prefix_len
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::CacheMode;
    use crate::types::{Verbosity, DEFAULT_CACHE_DIR};

    #[test]
    fn empty_config_is_default() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config, MemoConfig::default());
        assert_eq!(config.cache.dir, DEFAULT_CACHE_DIR);
        assert_eq!(config.cache.mode, CacheMode::On);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[cache]
dir = "~/.cache/pipeline"
mode = "readonly"
verbose = 2
qualify = ["features::normalize"]
qualify_mode = "clear"
hash_length = 32
key_prefix_len = 16
compress = true
"#;
        let config = load_config_from_str(toml).unwrap();
        let cache = &config.cache;
        assert_eq!(cache.dir, "~/.cache/pipeline");
        assert_eq!(cache.mode, CacheMode::ReadOnly);
        assert_eq!(cache.verbose, Verbosity::Level(2));
        assert_eq!(cache.qualify, vec!["features::normalize"]);
        assert_eq!(cache.qualify_mode, Some(CacheMode::Clear));
        assert_eq!(cache.hash_length, 32);
        assert_eq!(cache.key_prefix_len, 16);
        assert!(cache.compress);
    }

    #[test]
    fn verbose_by_name() {
        let config = load_config_from_str("[cache]\nverbose = \"all\"\n").unwrap();
        assert_eq!(config.cache.verbose, Verbosity::All);
    }

    #[test]
    fn unknown_mode_errors() {
        let err = load_config_from_str("[cache]\nmode = \"sometimes\"\n").unwrap_err();
        match err {
            ConfigError::ParseError(msg) => assert!(msg.contains("unknown cache mode 'sometimes'")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_field_errors() {
        let err = load_config_from_str("[cache]\ndirectory = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn update_and_qualify_conflict() {
        let toml = r#"
[cache]
qualify = ["a"]
update = ["b"]
"#;
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Conflict(_)));
    }

    #[test]
    fn empty_dir_errors() {
        let err = load_config_from_str("[cache]\ndir = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(_)));
    }

    #[test]
    fn hash_length_bounds() {
        let err = load_config_from_str("[cache]\nhash_length = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        let err = load_config_from_str("[cache]\nhash_length = 65\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(load_config(dir.path()).unwrap(), MemoConfig::default());
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[cache]\nmode = \"gen\"\n",
        )
        .unwrap();
        assert_eq!(load_config(dir.path()).unwrap().cache.mode, CacheMode::Gen);
    }
}
