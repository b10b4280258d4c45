//! Error types for management API calls

/// Errors from management API calls.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("management API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl Error {
    /// HTTP status of an API error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result alias for management API calls.
pub type Result<T> = std::result::Result<T, Error>;
