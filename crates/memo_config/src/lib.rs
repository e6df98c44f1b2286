//! Cache-mode policy and `memo.toml` configuration.
//!
//! [`CacheMode`] decides, per call, whether a cached function may read,
//! write or delete its record. [`load_config`] reads the `[cache]` table
//! of a `memo.toml` file into a validated [`MemoConfig`].

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod mode;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE_NAME};
pub use mode::CacheMode;
pub use types::*;
