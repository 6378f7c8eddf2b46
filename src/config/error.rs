//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from loading `popup.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read popup config `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("invalid popup.toml: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unusable popup config: {0}")]
    Validation(String),
}
