//! Management API constants

/// Path prefix shared by every management endpoint.
pub const API_PREFIX: &str = "/v0/management";

/// Base URL of a locally running CLIProxyAPI instance.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8317";

/// Per-request timeout applied when the caller does not override it.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Content type sent with uploaded auth files.
pub const AUTH_FILE_CONTENT_TYPE: &str = "application/json";
