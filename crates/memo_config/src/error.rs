//! Error types for cache modes and configuration loading.

/// Errors that can occur when interpreting cache configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading the configuration file.
    #[error("failed to read configuration: {0}")]
    IoError(#[from] std::io::Error),

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    ParseError(String),

    /// A cache mode name is not one of the known modes.
    #[error("unknown cache mode '{0}'; expected one of on, gen, off, clear, update, readonly")]
    UnknownCacheMode(String),

    /// A verbosity setting is neither `all`, `quiet` nor a level.
    #[error("unknown verbosity '{0}'; expected 'all', 'quiet' or a level")]
    UnknownVerbosity(String),

    /// Two settings that exclude each other were both given.
    #[error("conflicting settings: {0}")]
    Conflict(String),

    /// A required field is missing from the configuration.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A configuration value failed validation.
    #[error("validation error: {0}")]
    ValidationError(String),
}
