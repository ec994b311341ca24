use std::path::PathBuf;

use thiserror::Error;

use super::name::InvalidNameError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SourceError {
    #[error("required config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid key in config file '{path}': {source}")]
    InvalidKey {
        path: PathBuf,
        source: InvalidNameError,
    },
}
