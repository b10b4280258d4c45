//! Error types for guard operations

/// Errors from guard operations. None of these are fatal: the lifecycle logs
/// them, leaves the affected credential's state unchanged and retries on the
/// next cycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("remote call failed: {0}")]
    Remote(String),

    #[error("backup store error: {0}")]
    Backup(String),

    #[error("invalid credential name: {0:?}")]
    InvalidName(String),
}

impl From<cpa_management::Error> for Error {
    fn from(e: cpa_management::Error) -> Self {
        Error::Remote(e.to_string())
    }
}

/// Result alias for guard operations.
pub type Result<T> = std::result::Result<T, Error>;
