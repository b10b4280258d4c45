//! Configuration and startup errors

use thiserror::Error;

/// Errors raised while loading configuration. These are the only errors that
/// stop the process; everything at runtime is logged and retried.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("invalid value for {var}: {message}")]
    Env { var: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
