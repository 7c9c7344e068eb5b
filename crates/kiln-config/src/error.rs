//! Error types for configuration loading and validation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid value for `{field}`: {message}")]
    InvalidValue { field: &'static str, message: String },

    #[error("`build.command` and `build.request_pipe`/`build.response_pipe` cannot both be set")]
    ConflictingBuilders,

    #[error("`build.request_pipe` and `build.response_pipe` must be set together")]
    IncompletePipes,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}
